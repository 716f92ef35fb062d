//! Command dispatcher
//!
//! Turns one high-level call into a correctly sequenced set of packet
//! exchanges: encode the command frame, await exactly one acknowledge,
//! split the status byte, and drive multi-packet data streams. Protocol
//! faults (bad checksum, malformed frame, ack timeout) are retried up to
//! the configured bound; device-reported status codes are returned as data
//! and never retried here.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use zfmrust_core::{Command, Packet, PacketKind, HEADER_LENGTH};
use zfmrust_transport::Transport;
use zfmrust_types::StatusCode;

use crate::error::{Error, Result};

/// Decoded acknowledge: status code plus trailing payload bytes
#[derive(Debug, Clone)]
pub(crate) struct Ack {
    pub code: StatusCode,
    pub payload: Bytes,
}

/// Per-link exchange engine
///
/// Owns the transport exclusively for the lifetime of one link. The
/// connection manager serializes access, so no two exchanges are ever in
/// flight concurrently.
pub(crate) struct Dispatcher {
    transport: Box<dyn Transport>,
    address: u32,
    packet_size: usize,
    retries: u32,
    ack_timeout: Duration,
    cancel: CancellationToken,
    epoch: u64,
}

impl Dispatcher {
    pub fn new(
        transport: Box<dyn Transport>,
        address: u32,
        packet_size: usize,
        retries: u32,
        ack_timeout: Duration,
        cancel: CancellationToken,
        epoch: u64,
    ) -> Self {
        Self {
            transport,
            address,
            packet_size,
            retries,
            ack_timeout,
            cancel,
            epoch,
        }
    }

    /// Link generation this dispatcher belongs to
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Retarget subsequent frames (after a successful address-set)
    pub fn set_address(&mut self, address: u32) {
        self.address = address;
    }

    /// Renegotiate the data packet size
    pub fn set_packet_size(&mut self, packet_size: usize) {
        self.packet_size = packet_size;
    }

    /// Send one command and await its acknowledge
    pub async fn command(&mut self, command: Command, args: &[u8]) -> Result<Ack> {
        let mut payload = BytesMut::with_capacity(1 + args.len());
        payload.put_u8(command.into());
        payload.put_slice(args);

        let frame = Packet::with_payload(PacketKind::Command, payload.freeze())
            .encode(self.address, self.packet_size)?;

        debug!(command = %command, "exchange");

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_exchange(&frame).await {
                Ok(ack) => {
                    trace!(command = %command, code = %ack.code, "acknowledged");
                    return Ok(ack);
                }
                Err(e) if e.is_protocol_fault() && attempt < self.retries => {
                    warn!(command = %command, attempt, error = %e, "protocol fault, retrying");
                    let _ = self.transport.clear_input();
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_exchange(&mut self, frame: &[u8]) -> Result<Ack> {
        self.send_frame(frame).await?;

        let packet = self.read_packet().await?;
        if packet.kind != PacketKind::Ack {
            return Err(zfmrust_core::Error::FrameMalformed(format!(
                "expected ACK, got {}",
                packet.kind
            ))
            .into());
        }
        if packet.payload.is_empty() {
            return Err(
                zfmrust_core::Error::FrameMalformed("empty acknowledge payload".into()).into(),
            );
        }

        let code = StatusCode::from_byte(packet.payload[0]);
        Ok(Ack {
            code,
            payload: packet.payload.slice(1..),
        })
    }

    /// Receive a device-to-host data stream until its end-of-data chunk
    pub async fn download(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let packet = match self.read_packet().await {
                Ok(packet) => packet,
                Err(e) if e.is_protocol_fault() => {
                    return Err(Error::TransferIncomplete(e.to_string()));
                }
                Err(e) => return Err(e),
            };

            match packet.kind {
                PacketKind::Data => out.extend_from_slice(&packet.payload),
                PacketKind::EndOfData => {
                    out.extend_from_slice(&packet.payload);
                    debug!(bytes = out.len(), "download complete");
                    return Ok(out.freeze());
                }
                other => {
                    return Err(Error::TransferIncomplete(format!(
                        "unexpected {} packet mid-stream",
                        other
                    )));
                }
            }
        }
    }

    /// Send a host-to-device data stream, final chunk tagged end-of-data
    pub async fn upload(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            let frame =
                Packet::new(PacketKind::EndOfData).encode(self.address, self.packet_size)?;
            return self.send_frame(&frame).await;
        }

        let mut chunks = data.chunks(self.packet_size).peekable();
        while let Some(chunk) = chunks.next() {
            let kind = if chunks.peek().is_some() {
                PacketKind::Data
            } else {
                PacketKind::EndOfData
            };
            let frame = Packet::with_payload(kind, Bytes::copy_from_slice(chunk))
                .encode(self.address, self.packet_size)?;
            self.send_frame(&frame).await?;
        }

        debug!(bytes = data.len(), "upload complete");
        Ok(())
    }

    /// Close the underlying transport
    pub async fn shutdown(&mut self) {
        let _ = self.transport.disconnect().await;
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        trace!("tx {}", hex::encode(frame));
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::ConnectionClosed),
            result = self.transport.send(frame) => result.map_err(Error::from),
        }
    }

    async fn read_packet(&mut self) -> Result<Packet> {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::ConnectionClosed),
            result = Self::read_packet_inner(
                &mut self.transport,
                self.address,
                self.ack_timeout,
            ) => result,
        }
    }

    async fn read_packet_inner(
        transport: &mut Box<dyn Transport>,
        address: u32,
        ack_timeout: Duration,
    ) -> Result<Packet> {
        // Header first: marker + address + kind + length tell us how much
        // of the stream belongs to this frame
        let header = transport.receive_exact(HEADER_LENGTH, ack_timeout).await?;
        let length = u16::from_be_bytes([header[7], header[8]]) as usize;

        let body = transport.receive_exact(length, ack_timeout).await?;

        let mut frame = BytesMut::with_capacity(HEADER_LENGTH + length);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&body);
        trace!("rx {}", hex::encode(&frame));

        Ok(Packet::decode(frame, address)?)
    }
}
