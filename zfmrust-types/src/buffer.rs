//! Character buffer identifiers

use std::fmt;

/// One of the two onboard scratch slots holding extracted features
/// during matching and enrollment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BufferId {
    Buffer1 = 0x01,
    Buffer2 = 0x02,
}

impl BufferId {
    /// Raw wire value
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer1 => write!(f, "BUFFER_1"),
            Self::Buffer2 => write!(f, "BUFFER_2"),
        }
    }
}
