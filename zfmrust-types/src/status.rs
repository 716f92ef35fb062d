//! Device status codes
//!
//! Every acknowledge packet carries one of these in its first payload byte.
//! `Success` (and `HandshakeSuccess`, for the handshake command only) denote
//! no error; everything else is a specific failure category reported by the
//! sensor itself.

use std::fmt;

/// Status code returned by the sensor in an acknowledge packet
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0x00,
    HandshakeSuccess = 0x55,

    // Communication
    PacketTransmission = 0x01,
    PacketReception = 0x0E,
    PacketFaulty = 0xFE,
    CommunicationPort = 0x1D,

    // Finger / image quality
    FingerNotInSensor = 0x02,
    FingerEnrollFailed = 0x03,
    FingerMismatch = 0x08,
    FingerNotFound = 0x09,
    ImageMessy = 0x06,
    ImageInvalid = 0x15,
    ImageFewFeaturePoints = 0x07,
    ImageDownload = 0x0F,

    // Template / database
    CharacteristicsMismatch = 0x0A,
    TemplateInvalidIndex = 0x0B,
    TemplateLoad = 0x0C,
    TemplateUpload = 0xFD,
    TemplateDownload = 0x0D,
    TemplateDelete = 0x10,
    TemplateEmpty = 0x11,
    DatabaseFull = 0x1F,

    // Configuration / authentication
    InvalidRegister = 0x1A,
    InvalidConfiguration = 0x1B,
    NotepadInvalidPage = 0x1C,
    Flash = 0x18,
    Address = 0x20,
    Password = 0x13,
    PasswordVerify = 0x21,

    Timeout = 0xFF,
    Undefined = 0x19,
}

impl StatusCode {
    /// Decode a status byte.
    ///
    /// Total: bytes outside the catalogue map to `Undefined` rather than
    /// failing the exchange. A garbled status is device data, not a frame
    /// fault.
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x55 => Self::HandshakeSuccess,
            0x01 => Self::PacketTransmission,
            0x0E => Self::PacketReception,
            0xFE => Self::PacketFaulty,
            0x1D => Self::CommunicationPort,
            0x02 => Self::FingerNotInSensor,
            0x03 => Self::FingerEnrollFailed,
            0x08 => Self::FingerMismatch,
            0x09 => Self::FingerNotFound,
            0x06 => Self::ImageMessy,
            0x15 => Self::ImageInvalid,
            0x07 => Self::ImageFewFeaturePoints,
            0x0F => Self::ImageDownload,
            0x0A => Self::CharacteristicsMismatch,
            0x0B => Self::TemplateInvalidIndex,
            0x0C => Self::TemplateLoad,
            0xFD => Self::TemplateUpload,
            0x0D => Self::TemplateDownload,
            0x10 => Self::TemplateDelete,
            0x11 => Self::TemplateEmpty,
            0x1F => Self::DatabaseFull,
            0x1A => Self::InvalidRegister,
            0x1B => Self::InvalidConfiguration,
            0x1C => Self::NotepadInvalidPage,
            0x18 => Self::Flash,
            0x20 => Self::Address,
            0x13 => Self::Password,
            0x21 => Self::PasswordVerify,
            0xFF => Self::Timeout,
            _ => Self::Undefined,
        }
    }

    /// Raw wire value
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Check if this code denotes success for an ordinary command
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if this code denotes success for the handshake command
    pub fn is_handshake_success(self) -> bool {
        matches!(self, Self::Success | Self::HandshakeSuccess)
    }

    /// Get status name
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::HandshakeSuccess => "HANDSHAKE_SUCCESS",
            Self::PacketTransmission => "ERROR_PACKET_TRANSMISSION",
            Self::PacketReception => "ERROR_PACKET_RECEPTION",
            Self::PacketFaulty => "ERROR_PACKET_FAULTY",
            Self::CommunicationPort => "ERROR_COMMUNICATION_PORT",
            Self::FingerNotInSensor => "ERROR_FINGER_NOT_IN_SENSOR",
            Self::FingerEnrollFailed => "ERROR_FINGER_ENROLL_FAILED",
            Self::FingerMismatch => "ERROR_FINGER_MISMATCH",
            Self::FingerNotFound => "ERROR_FINGER_NOT_FOUND",
            Self::ImageMessy => "ERROR_IMAGE_MESSY",
            Self::ImageInvalid => "ERROR_IMAGE_INVALID",
            Self::ImageFewFeaturePoints => "ERROR_IMAGE_FEW_FEATURE_POINTS",
            Self::ImageDownload => "ERROR_IMAGE_DOWNLOAD",
            Self::CharacteristicsMismatch => "ERROR_CHARACTERISTICS_MISMATCH",
            Self::TemplateInvalidIndex => "ERROR_TEMPLATE_INVALID_INDEX",
            Self::TemplateLoad => "ERROR_TEMPLATE_LOAD",
            Self::TemplateUpload => "ERROR_TEMPLATE_UPLOAD",
            Self::TemplateDownload => "ERROR_TEMPLATE_DOWNLOAD",
            Self::TemplateDelete => "ERROR_TEMPLATE_DELETE",
            Self::TemplateEmpty => "ERROR_TEMPLATE_EMPTY",
            Self::DatabaseFull => "ERROR_DATABASE_FULL",
            Self::InvalidRegister => "ERROR_INVALID_REGISTER",
            Self::InvalidConfiguration => "ERROR_INVALID_CONFIGURATION",
            Self::NotepadInvalidPage => "ERROR_NOTEPAD_INVALID_PAGE",
            Self::Flash => "ERROR_FLASH",
            Self::Address => "ERROR_ADDRESS",
            Self::Password => "ERROR_PASSWORD",
            Self::PasswordVerify => "ERROR_PASSWORD_VERIFY",
            Self::Timeout => "ERROR_TIMEOUT",
            Self::Undefined => "ERROR_UNDEFINED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_round_trip() {
        for code in [
            StatusCode::Success,
            StatusCode::HandshakeSuccess,
            StatusCode::FingerNotInSensor,
            StatusCode::DatabaseFull,
            StatusCode::Timeout,
        ] {
            assert_eq!(StatusCode::from_byte(code.as_byte()), code);
        }
    }

    #[test]
    fn test_unknown_byte_is_undefined() {
        assert_eq!(StatusCode::from_byte(0x7A), StatusCode::Undefined);
    }

    #[test]
    fn test_success_predicates() {
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::HandshakeSuccess.is_success());
        assert!(StatusCode::HandshakeSuccess.is_handshake_success());
        assert!(StatusCode::Success.is_handshake_success());
        assert!(!StatusCode::FingerMismatch.is_success());
    }
}
