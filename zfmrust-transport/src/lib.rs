//! Transport layer for zfmrust
//!
//! Provides serial-link communication with the sensor behind an
//! object-safe trait so the protocol engine can be driven against
//! test doubles.

pub mod error;
pub mod serial;

pub use error::{Error, Result};
pub use serial::{list_ports, SerialTransport};

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different link types
///
/// The serial link is an undelimited byte stream; framing belongs to the
/// caller, so reads are exact-length rather than datagram-shaped.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link
    async fn connect(&mut self) -> Result<()>;

    /// Close the link
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if the link is open
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly `len` bytes within `timeout`
    async fn receive_exact(&mut self, len: usize, timeout: Duration) -> Result<BytesMut>;

    /// Discard any unread input
    fn clear_input(&mut self) -> Result<()>;

    /// Get a printable link identifier
    fn name(&self) -> String;
}
