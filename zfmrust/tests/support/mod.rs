//! Scripted in-memory transport for driving the engine without hardware

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

use zfmrust::transport::{Error as TransportError, Result as TransportResult, Transport};
use zfmrust::{Packet, PacketKind, StatusCode, TransportFactory};

/// Default test address (broadcast, matching `SensorConfig` defaults)
pub const ADDRESS: u32 = 0xFFFF_FFFF;

const MAX_PAYLOAD: usize = 256;

/// One scripted reaction to the next command frame the host sends
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this raw frame
    Reply(Vec<u8>),
    /// Answer with several raw frames (acknowledge plus data stream)
    ReplyMany(Vec<Vec<u8>>),
    /// Swallow the command; the host read will time out
    Silence,
    /// Kill the link; every following read or write fails
    Drop,
}

/// Build an acknowledge frame: status code plus trailing payload
pub fn ack_frame(code: StatusCode, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![code.as_byte()];
    body.extend_from_slice(payload);
    Packet::with_payload(PacketKind::Ack, body)
        .encode(ADDRESS, MAX_PAYLOAD)
        .unwrap()
        .to_vec()
}

/// Build a data-stream chunk frame
pub fn data_frame(last: bool, payload: &[u8]) -> Vec<u8> {
    let kind = if last {
        PacketKind::EndOfData
    } else {
        PacketKind::Data
    };
    Packet::with_payload(kind, payload.to_vec())
        .encode(ADDRESS, MAX_PAYLOAD)
        .unwrap()
        .to_vec()
}

/// Corrupt one payload byte of a well-formed frame
pub fn corrupt(mut frame: Vec<u8>) -> Vec<u8> {
    frame[9] ^= 0x01;
    frame
}

/// Transport double that plays back a script of reactions
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    rx: BytesMut,
    connected: bool,
    dead: bool,
    available: bool,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            rx: BytesMut::new(),
            connected: false,
            dead: false,
            available: true,
        }
    }

    /// A transport whose port cannot be opened
    pub fn unavailable() -> Self {
        let mut transport = Self::new(Vec::new());
        transport.available = false;
        transport
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> TransportResult<()> {
        if !self.available {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no such port",
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        if self.dead {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link dropped",
            )));
        }
        // Only command frames advance the script; data chunks flow freely
        if data.len() > 6 && data[6] == PacketKind::Command as u8 {
            match self.steps.pop_front() {
                Some(Step::Reply(frame)) => self.rx.extend_from_slice(&frame),
                Some(Step::ReplyMany(frames)) => {
                    for frame in frames {
                        self.rx.extend_from_slice(&frame);
                    }
                }
                Some(Step::Silence) => {}
                Some(Step::Drop) => self.dead = true,
                None => {}
            }
        }
        Ok(())
    }

    async fn receive_exact(&mut self, len: usize, _timeout: Duration) -> TransportResult<BytesMut> {
        if self.rx.len() >= len {
            return Ok(self.rx.split_to(len));
        }
        if self.dead {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link dropped",
            )));
        }
        Err(TransportError::ReadTimeout)
    }

    fn clear_input(&mut self) -> TransportResult<()> {
        self.rx.clear();
        Ok(())
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// Factory handing out one scripted transport per connection attempt;
/// once exhausted, further attempts fail to open
pub fn scripted_factory(scripts: Vec<Vec<Step>>) -> TransportFactory {
    let queue: Arc<Mutex<VecDeque<Vec<Step>>>> = Arc::new(Mutex::new(scripts.into()));
    Box::new(move || {
        let mut queue = queue.lock().unwrap();
        match queue.pop_front() {
            Some(steps) => Box::new(ScriptedTransport::new(steps)),
            None => Box::new(ScriptedTransport::unavailable()),
        }
    })
}
