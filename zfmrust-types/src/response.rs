//! Operation response variants
//!
//! Device-reported outcomes are values the caller branches on, never
//! failures of the call itself. `succeeded` tracks `code` (`Success`, or
//! `HandshakeSuccess` for the handshake command); the rest of each variant
//! carries whatever payload the originating command produces.

use bytes::Bytes;

use crate::image::ImageBuffer;
use crate::params::SystemParameters;
use crate::status::StatusCode;

/// Typed outcome of one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Outcome of a set-style command with no trailing payload
    Plain { succeeded: bool, code: StatusCode },

    /// Outcome carrying the raw acknowledge payload plus decoded data
    WithData {
        succeeded: bool,
        code: StatusCode,
        /// Acknowledge payload without the status byte
        frame_payload: Bytes,
        /// Decoded data derived from the payload
        data: Bytes,
    },

    /// Outcome of a fingerprint match
    MatchResult {
        succeeded: bool,
        code: StatusCode,
        /// Index of the matching template, -1 when none qualified
        index: i32,
        /// Matching accuracy score
        score: u16,
    },

    /// Outcome carrying a single command-dependent value
    WithValue {
        succeeded: bool,
        code: StatusCode,
        value: Value,
    },
}

/// Command-dependent response value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(u32),
    Bytes(Bytes),
    Image(ImageBuffer),
    Parameters(SystemParameters),
}

impl Response {
    /// Whether the device reported success
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Plain { succeeded, .. }
            | Self::WithData { succeeded, .. }
            | Self::MatchResult { succeeded, .. }
            | Self::WithValue { succeeded, .. } => *succeeded,
        }
    }

    /// The device status code
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Plain { code, .. }
            | Self::WithData { code, .. }
            | Self::MatchResult { code, .. }
            | Self::WithValue { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessors() {
        let resp = Response::MatchResult {
            succeeded: false,
            code: StatusCode::FingerNotFound,
            index: -1,
            score: 0,
        };
        assert!(!resp.succeeded());
        assert_eq!(resp.code(), StatusCode::FingerNotFound);
    }
}
