//! # zfmrust
//!
//! Rust driver for ZFM/R30x optical fingerprint modules over a serial link.
//!
//! ## Features
//!
//! - Checksummed binary frame codec with strict validation
//! - Async command dispatcher with timeout/retry policy
//! - Self-healing connection manager with ready notifications
//! - Full template lifecycle: enroll, match, store, transfer
//!
//! ## Quick Start
//!
//! ```no_run
//! use zfmrust::{BufferId, Sensor, SensorConfig};
//!
//! #[tokio::main]
//! async fn main() -> zfmrust::Result<()> {
//!     let sensor = Sensor::new(SensorConfig::new("/dev/ttyUSB0"));
//!     sensor.wait_ready().await?;
//!
//!     // Capture and extract features
//!     sensor.image_capture().await?;
//!     sensor.image_convert(BufferId::Buffer1).await?;
//!
//!     // Search the onboard library
//!     let found = sensor.match_1_n(BufferId::Buffer1).await?;
//!     println!("{:?}", found);
//!
//!     sensor.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod sensor;

// Re-exports
pub use config::SensorConfig;
pub use connection::{LinkState, ReadyFuture, TransportFactory};
pub use error::{Error, Result};
pub use sensor::Sensor;

// Re-export protocol types
pub use zfmrust_core::{Command, Packet, PacketKind};
pub use zfmrust_transport as transport;
pub use zfmrust_transport::{SerialTransport, Transport};
pub use zfmrust_types::{
    BaudRate, BufferId, ImageBuffer, PacketSize, ParameterId, Response, SecurityLevel, StatusCode,
    SystemParameters, Value,
};
