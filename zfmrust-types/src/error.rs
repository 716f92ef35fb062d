//! Error types for zfmrust-types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Baudrate is not one of the 12 values the sensor supports
    #[error("Baudrate {0} is not supported by the sensor")]
    UnsupportedBaudRate(u32),

    /// Packet size is not one of 32/64/128/256
    #[error("Packet size {0} is not compatible with the sensor")]
    UnsupportedPacketSize(u32),

    /// Security level outside 1..=5
    #[error("Security level {0} is out of range (1..=5)")]
    UnsupportedSecurityLevel(u8),
}
