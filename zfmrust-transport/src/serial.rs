//! Serial transport
//!
//! Opens the sensor's UART link in the standard 8N1 configuration with no
//! flow control.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// List available serial port names
pub fn list_ports() -> Vec<String> {
    let mut names: Vec<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort();
    names
}

/// Serial transport for ZFM sensors
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a new serial transport (not yet opened)
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            stream: None,
        }
    }

    /// Port baudrate this transport opens with
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud...", self.path, self.baud_rate);

        let builder = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None);

        #[allow(unused_mut)]
        let mut stream = builder.open_native_async()?;

        #[cfg(unix)]
        stream.set_exclusive(true)?;

        // Stale bytes from a previous session would desync the first frame
        stream.clear(ClearBuffer::All)?;

        debug!("Opened {}", self.path);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("Closing {}...", self.path);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive_exact(&mut self, len: usize, timeout_duration: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(len);

        match timeout(timeout_duration, stream.read_exact(&mut buf[..])).await {
            Err(_) => Err(Error::ReadTimeout),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::ConnectionClosed)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Ok(Ok(_)) => {
                trace!("Received {} bytes: {:02X?}", len, &buf[..len.min(16)]);
                Ok(buf)
            }
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0", 57600);
        assert!(!transport.is_connected());
        assert_eq!(transport.name(), "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_serial_transport_not_connected() {
        let mut transport = SerialTransport::new("/dev/ttyUSB0", 57600);

        let result = transport.send(&[0x01]).await;
        assert!(matches!(result, Err(Error::NotConnected)));

        let result = transport
            .receive_exact(4, Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_serial_transport_invalid_port() {
        let mut transport = SerialTransport::new("/dev/does-not-exist", 57600);

        let result = transport.connect().await;
        assert!(result.is_err());
    }
}
