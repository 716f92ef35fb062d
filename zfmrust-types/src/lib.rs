//! Type definitions for zfmrust
//!
//! Plain protocol value types shared across the workspace:
//! - Device status-code table
//! - Baudrate / security / packet-size codes and their conversions
//! - System parameter block
//! - Operation response variants

pub mod buffer;
pub mod error;
pub mod image;
pub mod params;
pub mod response;
pub mod status;

pub use buffer::BufferId;
pub use error::{Error, Result};
pub use image::ImageBuffer;
pub use params::{BaudRate, PacketSize, ParameterId, SecurityLevel, SystemParameters};
pub use response::{Response, Value};
pub use status::StatusCode;

/// Notepad page size in bytes
pub const NOTEPAD_PAGE_SIZE: usize = 32;

/// Number of notepad pages on the device
pub const NOTEPAD_PAGE_COUNT: u8 = 16;
