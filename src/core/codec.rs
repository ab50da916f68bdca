//! # Packet Framer
//!
//! Turns a raw byte stream into discrete, length-delimited packets and back.
//!
//! The codec operates on an append-only receive buffer per direction: bytes
//! read from a socket are fed into a `BytesMut`, and `decode` is called in a
//! loop since one read may carry several packets. Fewer bytes than the fixed
//! header yields `None` (read more); a declared payload length above the
//! configured maximum is a protocol error and the session must close.
//!
//! ## Security
//! - Length validation happens before any allocation
//! - The size limit defends against maliciously large length fields

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{Packet, PacketKind, HEADER_SIZE};
use crate::error::ProxyError;

/// Default cap on the declared payload length (64 KB - the u16 length field
/// can't express more, but a lower operator-configured cap still applies).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024;

/// Framing codec for the relay wire format
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProxyError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProxyError> {
        if src.len() < HEADER_SIZE {
            // Caller must read more bytes
            return Ok(None);
        }

        let declared = u16::from_le_bytes([src[1], src[2]]) as usize;
        if declared > self.max_packet_size {
            return Err(ProxyError::OversizedPacket(declared));
        }

        if src.len() < HEADER_SIZE + declared {
            src.reserve(HEADER_SIZE + declared - src.len());
            return Ok(None);
        }

        let kind = PacketKind::from_byte(src[0]);
        src.advance(HEADER_SIZE);
        let payload = src.split_to(declared).to_vec();

        Ok(Some(Packet { kind, payload }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProxyError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), ProxyError> {
        if packet.payload.len() > self.max_packet_size || packet.payload.len() > u16::MAX as usize {
            return Err(ProxyError::OversizedPacket(packet.payload.len()));
        }

        dst.reserve(HEADER_SIZE + packet.payload.len());
        dst.put_u8(packet.kind.as_byte());
        dst.put_u16_le(packet.payload.len() as u16);
        dst.put_slice(&packet.payload);

        Ok(())
    }
}
