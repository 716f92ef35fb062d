//! High-level error types

use zfmrust_types::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] zfmrust_core::Error),

    #[error("Transport error: {0}")]
    Transport(zfmrust_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] zfmrust_types::Error),

    /// No acknowledge arrived within the per-operation timeout
    #[error("Timed out waiting for the device acknowledge")]
    CommunicationTimeout,

    /// The link dropped while an exchange was in flight
    #[error("Link lost during the exchange")]
    ConnectionLost,

    /// The session was shut down
    #[error("Session is stopped")]
    ConnectionClosed,

    /// The link is not up yet (connecting or handshaking)
    #[error("Sensor is not ready")]
    NotReady,

    /// A multi-packet transfer ended short or out of order
    #[error("Data transfer incomplete: {0}")]
    TransferIncomplete(String),

    /// The device rejected the password/address handshake
    #[error("Device rejected authentication: {0}")]
    AuthenticationFailed(StatusCode),

    /// The overall deadline of a finger wait expired
    #[error("Deadline expired while waiting for the finger")]
    DeadlineExpired,

    /// Notepad page outside 0..16
    #[error("Notepad page {0} is out of range")]
    InvalidNotepadPage(u8),

    /// Notepad write larger than one page
    #[error("Notepad data is {0} bytes, a page holds 32")]
    NotepadDataTooLong(usize),

    /// Index-table page outside 0..4
    #[error("Index table page {0} is out of range")]
    InvalidIndexPage(u8),
}

impl From<zfmrust_transport::Error> for Error {
    fn from(e: zfmrust_transport::Error) -> Self {
        match e {
            zfmrust_transport::Error::ReadTimeout => Self::CommunicationTimeout,
            other => Self::Transport(other),
        }
    }
}

impl Error {
    /// Check if this is a protocol-layer fault worth a transparent retry
    pub fn is_protocol_fault(&self) -> bool {
        use zfmrust_core::Error as Core;
        matches!(self, Self::CommunicationTimeout)
            || matches!(
                self,
                Self::Core(
                    Core::ChecksumMismatch { .. }
                        | Core::FrameTooShort { .. }
                        | Core::FrameMalformed(_)
                        | Core::AddressMismatch { .. }
                        | Core::UnknownPacketKind(_)
                )
            )
    }

    /// Check if this means the physical link is gone
    pub fn is_link_failure(&self) -> bool {
        use zfmrust_transport::Error as Transport;
        matches!(self, Self::ConnectionLost)
            || matches!(
                self,
                Self::Transport(
                    Transport::Io(_)
                        | Transport::ConnectionClosed
                        | Transport::NotConnected
                        | Transport::Serial(_)
                )
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_communication_timeout() {
        let e = Error::from(zfmrust_transport::Error::ReadTimeout);
        assert!(matches!(e, Error::CommunicationTimeout));
        assert!(e.is_protocol_fault());
        assert!(!e.is_link_failure());
    }

    #[test]
    fn test_io_is_link_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let e = Error::from(zfmrust_transport::Error::Io(io));
        assert!(e.is_link_failure());
        assert!(!e.is_protocol_fault());
    }

    #[test]
    fn test_checksum_is_protocol_fault() {
        let e = Error::from(zfmrust_core::Error::ChecksumMismatch {
            expected: 1,
            received: 2,
        });
        assert!(e.is_protocol_fault());
    }
}
