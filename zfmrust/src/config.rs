//! Session configuration

use std::time::Duration;

use zfmrust_core::{BROADCAST_ADDRESS, DEFAULT_PASSWORD};
use zfmrust_types::{BaudRate, PacketSize};

/// Configuration for a sensor session
///
/// All knobs are explicit construction-time values; nothing is read from
/// process-wide state.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0" or "COM15")
    pub port: String,

    /// Serial baudrate
    pub baud_rate: BaudRate,

    /// Device address to talk to
    pub address: u32,

    /// Handshake password
    pub password: u32,

    /// Address to assign to the device during every handshake
    pub assign_address: Option<u32>,

    /// Negotiated data packet size
    pub packet_size: PacketSize,

    /// Attempts per operation before a protocol fault is surfaced
    pub retries: u32,

    /// Bounded wait for each acknowledge
    pub ack_timeout: Duration,

    /// Pause between reconnection attempts
    pub reconnect_backoff: Duration,
}

impl SensorConfig {
    /// Create a configuration with the module factory defaults
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: BaudRate::Baud57600,
            address: BROADCAST_ADDRESS,
            password: DEFAULT_PASSWORD,
            assign_address: None,
            packet_size: PacketSize::Size128,
            retries: 3,
            ack_timeout: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(2),
        }
    }

    /// Set the serial baudrate
    pub fn with_baud_rate(mut self, baud_rate: BaudRate) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the device address
    pub fn with_address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }

    /// Set the handshake password
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    /// Assign this address to the device on every handshake
    pub fn with_assigned_address(mut self, address: u32) -> Self {
        self.assign_address = Some(address);
        self
    }

    /// Set the negotiated data packet size
    pub fn with_packet_size(mut self, packet_size: PacketSize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Set the attempts-per-operation bound
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Set the acknowledge timeout
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the reconnect backoff interval
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SensorConfig::new("/dev/ttyUSB0");
        assert_eq!(config.address, BROADCAST_ADDRESS);
        assert_eq!(config.password, DEFAULT_PASSWORD);
        assert_eq!(config.retries, 3);
        assert_eq!(config.packet_size, PacketSize::Size128);
    }

    #[test]
    fn test_retries_floor() {
        let config = SensorConfig::new("COM15").with_retries(0);
        assert_eq!(config.retries, 1);
    }
}
