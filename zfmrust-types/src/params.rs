//! System parameters and configuration codes
//!
//! The sensor reports its configuration as a fixed 16-byte block:
//!
//! ```text
//! 0: Status       : 2 byte MSB    : 0 - 1
//! 1: ID           : 2 byte MSB    : 2 - 3
//! 2: Lib. Size    : 2 byte MSB    : 4 - 5
//! 3: Security Lvl.: 2 byte MSB    : 6 - 7
//! 4: Address      : 4 byte MSB    : 8 - 11
//! 5: Pack. Size   : 2 byte MSB    : 12 - 13
//! 6: Baudrate     : 2 byte MSB    : 14 - 15
//! ```
//!
//! Baudrate, security and packet size travel as compact enumerated codes.
//! The conversions between codes and physical values are free functions so
//! the enums stay simple closed tag sets.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Serialized length of the parameter block
pub const SYSTEM_PARAMETERS_LENGTH: usize = 16;

/// Compact baudrate code (code * 9600 = baud)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BaudRate {
    Baud9600 = 0x01,
    Baud19200 = 0x02,
    Baud28800 = 0x03,
    Baud38400 = 0x04,
    Baud48000 = 0x05,
    Baud57600 = 0x06,
    Baud67200 = 0x07,
    Baud76800 = 0x08,
    Baud86400 = 0x09,
    Baud96000 = 0x0A,
    Baud105600 = 0x0B,
    Baud115200 = 0x0C,
}

impl BaudRate {
    /// Decode a baudrate code byte
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Baud9600),
            0x02 => Some(Self::Baud19200),
            0x03 => Some(Self::Baud28800),
            0x04 => Some(Self::Baud38400),
            0x05 => Some(Self::Baud48000),
            0x06 => Some(Self::Baud57600),
            0x07 => Some(Self::Baud67200),
            0x08 => Some(Self::Baud76800),
            0x09 => Some(Self::Baud86400),
            0x0A => Some(Self::Baud96000),
            0x0B => Some(Self::Baud105600),
            0x0C => Some(Self::Baud115200),
            _ => None,
        }
    }

    /// Raw wire code
    pub fn as_code(self) -> u8 {
        self as u8
    }
}

/// Matching strictness level
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SecurityLevel {
    Level1 = 0x01,
    Level2 = 0x02,
    Level3 = 0x03,
    Level4 = 0x04,
    Level5 = 0x05,
}

impl SecurityLevel {
    /// Decode a security level byte
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Level1),
            0x02 => Some(Self::Level2),
            0x03 => Some(Self::Level3),
            0x04 => Some(Self::Level4),
            0x05 => Some(Self::Level5),
            _ => None,
        }
    }

    /// Raw wire code
    pub fn as_code(self) -> u8 {
        self as u8
    }
}

/// Compact packet-size code (32 * 2^code = bytes)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketSize {
    Size32 = 0x00,
    Size64 = 0x01,
    Size128 = 0x02,
    Size256 = 0x03,
}

impl PacketSize {
    /// Decode a packet-size code byte
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Size32),
            0x01 => Some(Self::Size64),
            0x02 => Some(Self::Size128),
            0x03 => Some(Self::Size256),
            _ => None,
        }
    }

    /// Raw wire code
    pub fn as_code(self) -> u8 {
        self as u8
    }
}

/// Writable parameter registers for the parameters-set command
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParameterId {
    BaudRate = 0x04,
    Security = 0x05,
    PacketSize = 0x06,
}

/// Convert a baudrate code into its physical value
pub fn baud_to_int(code: BaudRate) -> u32 {
    code.as_code() as u32 * 9600
}

/// Convert an integer into a baudrate code.
///
/// Accepts either a raw code (1..=12) or a physical baudrate that is an
/// exact multiple of 9600 up to 115200. Anything else fails with
/// [`Error::UnsupportedBaudRate`].
pub fn baud_from_int(value: u32) -> Result<BaudRate> {
    if let Ok(code) = u8::try_from(value) {
        if let Some(baud) = BaudRate::from_code(code) {
            return Ok(baud);
        }
    }
    if value % 9600 == 0 {
        if let Some(baud) = u8::try_from(value / 9600).ok().and_then(BaudRate::from_code) {
            return Ok(baud);
        }
    }
    Err(Error::UnsupportedBaudRate(value))
}

/// Convert a packet-size code into its byte count
pub fn packet_size_to_int(code: PacketSize) -> u32 {
    32 << code.as_code()
}

/// Convert an integer into a packet-size code.
///
/// Accepts either a raw code (0..=3) or one of the literal sizes
/// 32/64/128/256. Anything else fails with
/// [`Error::UnsupportedPacketSize`].
pub fn packet_size_from_int(value: u32) -> Result<PacketSize> {
    if let Ok(code) = u8::try_from(value) {
        if let Some(size) = PacketSize::from_code(code) {
            return Ok(size);
        }
    }
    let size = match value {
        32 => Some(PacketSize::Size32),
        64 => Some(PacketSize::Size64),
        128 => Some(PacketSize::Size128),
        256 => Some(PacketSize::Size256),
        _ => None,
    };
    size.ok_or(Error::UnsupportedPacketSize(value))
}

/// Snapshot of the sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParameters {
    /// Status register, low nibble only
    pub status: u16,

    /// System identifier code
    pub id: u16,

    /// Device address
    pub address: u32,

    /// Fingerprint library capacity
    pub capacity: u16,

    /// Negotiated data packet size
    pub packet_size: PacketSize,

    /// Matching security level
    pub security: SecurityLevel,

    /// Serial baudrate code
    pub baud_rate: BaudRate,
}

impl SystemParameters {
    /// Serialize into the fixed 16-byte big-endian block
    pub fn serialize(&self) -> [u8; SYSTEM_PARAMETERS_LENGTH] {
        let mut buf = [0u8; SYSTEM_PARAMETERS_LENGTH];
        BigEndian::write_u16(&mut buf[0..2], self.status);
        BigEndian::write_u16(&mut buf[2..4], self.id);
        BigEndian::write_u16(&mut buf[4..6], self.capacity);
        BigEndian::write_u16(&mut buf[6..8], self.security.as_code() as u16);
        BigEndian::write_u32(&mut buf[8..12], self.address);
        BigEndian::write_u16(&mut buf[12..14], self.packet_size.as_code() as u16);
        BigEndian::write_u16(&mut buf[14..16], self.baud_rate.as_code() as u16);
        buf
    }

    /// Parse the parameter block.
    ///
    /// Returns `None` on short input or when the security, packet-size or
    /// baudrate field is not a recognized code. The status field is masked
    /// to its low nibble.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < SYSTEM_PARAMETERS_LENGTH {
            return None;
        }

        let status = BigEndian::read_u16(&data[0..2]);
        let id = BigEndian::read_u16(&data[2..4]);
        let capacity = BigEndian::read_u16(&data[4..6]);
        let security_raw = BigEndian::read_u16(&data[6..8]);
        let address = BigEndian::read_u32(&data[8..12]);
        let packet_raw = BigEndian::read_u16(&data[12..14]);
        let baud_raw = BigEndian::read_u16(&data[14..16]);

        let security = SecurityLevel::from_code(u8::try_from(security_raw).ok()?)?;
        let packet_size = PacketSize::from_code(u8::try_from(packet_raw).ok()?)?;
        let baud_rate = BaudRate::from_code(u8::try_from(baud_raw).ok()?)?;

        Some(Self {
            status: status & 0x0F,
            id,
            address,
            capacity,
            packet_size,
            security,
            baud_rate,
        })
    }
}

impl fmt::Display for SystemParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SystemParameters(status=0x{:04X}, id=0x{:04X}, address=0x{:08X}, capacity={}, \
             packet={}B, security={:?}, baudrate={})",
            self.status,
            self.id,
            self.address,
            self.capacity,
            packet_size_to_int(self.packet_size),
            self.security,
            baud_to_int(self.baud_rate),
        )
    }
}
