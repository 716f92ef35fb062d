//! Error types for zfmrust-core

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload exceeds the negotiated packet size
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Frame violates the wire structure
    #[error("Frame malformed: {0}")]
    FrameMalformed(String),

    /// Frame was addressed to a different device
    #[error("Address mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    AddressMismatch {
        expected: u32,
        actual: u32,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown packet kind tag
    #[error("Unknown packet kind: 0x{0:02X}")]
    UnknownPacketKind(u8),

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),
}
