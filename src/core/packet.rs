//! # Packet Model
//!
//! A single protocol message: a one-byte type discriminant plus an opaque or
//! structured payload. Packets are ephemeral - the framer constructs them
//! from buffered bytes, hooks inspect or rewrite them, and the session either
//! forwards, drops, or replaces them.
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [Length(2, LE)] [Payload(N)]
//! ```
//!
//! The header is never enciphered; the cipher stream applies to payload
//! bytes only, so the framer can always read the type tag and apply the
//! cleartext-by-type rule.

use crate::core::variant::VariantRecord;
use crate::error::Result;

/// Size of the fixed packet header on the wire: type byte + u16 length.
pub const HEADER_SIZE: usize = 3;

/// Enumerated packet type discriminant.
///
/// Unknown discriminants are carried opaquely and relayed unchanged; the
/// proxy must not reject traffic just because a game update added a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Initial cleartext greeting, exchanged before any keys exist.
    Hello,
    /// Key-bearing handshake packet; observing it initializes the ciphers.
    SessionKey,
    /// Free-form text message.
    Text,
    /// Opaque game state update.
    Game,
    /// Keepalive probe.
    Ping,
    /// Keepalive reply.
    Pong,
    /// Structured call carrying a variant record payload.
    Call,
    /// Server-reported error.
    Error,
    /// Orderly teardown notice.
    Disconnect,
    /// Any discriminant this build does not know about.
    Unknown(u8),
}

impl PacketKind {
    /// Get the wire discriminant byte for this kind
    pub fn as_byte(self) -> u8 {
        match self {
            PacketKind::Hello => 0x01,
            PacketKind::SessionKey => 0x02,
            PacketKind::Text => 0x03,
            PacketKind::Game => 0x04,
            PacketKind::Ping => 0x05,
            PacketKind::Pong => 0x06,
            PacketKind::Call => 0x07,
            PacketKind::Error => 0x08,
            PacketKind::Disconnect => 0x09,
            PacketKind::Unknown(b) => b,
        }
    }

    /// Map a wire discriminant byte to a kind (total - unknown bytes are carried)
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => PacketKind::Hello,
            0x02 => PacketKind::SessionKey,
            0x03 => PacketKind::Text,
            0x04 => PacketKind::Game,
            0x05 => PacketKind::Ping,
            0x06 => PacketKind::Pong,
            0x07 => PacketKind::Call,
            0x08 => PacketKind::Error,
            0x09 => PacketKind::Disconnect,
            other => PacketKind::Unknown(other),
        }
    }

    /// Whether this type bypasses the cipher stream by protocol rule.
    ///
    /// Only the pre-key handshake exchange is cleartext; once ciphers are
    /// initialized these types are no longer legal on the wire.
    pub fn is_cleartext(self) -> bool {
        matches!(self, PacketKind::Hello | PacketKind::SessionKey)
    }

    /// Whether this type's payload is a variant record encoding
    pub fn is_variant_bearing(self) -> bool {
        matches!(self, PacketKind::Call)
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Hello => "Hello",
            PacketKind::SessionKey => "SessionKey",
            PacketKind::Text => "Text",
            PacketKind::Game => "Game",
            PacketKind::Ping => "Ping",
            PacketKind::Pong => "Pong",
            PacketKind::Call => "Call",
            PacketKind::Error => "Error",
            PacketKind::Disconnect => "Disconnect",
            PacketKind::Unknown(_) => "Unknown",
        }
    }
}

/// A single framed protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Decode this packet's payload as a variant record.
    ///
    /// Intended for hooks that need structured access to variant-bearing
    /// packets; the relay itself never forces this parse.
    pub fn variant_record(&self) -> Result<VariantRecord> {
        VariantRecord::decode(&self.payload)
    }

    /// Build a variant-bearing packet from a record
    pub fn from_variant_record(record: &VariantRecord) -> Self {
        Self {
            kind: PacketKind::Call,
            payload: record.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_roundtrip() {
        for byte in 0u8..=255 {
            let kind = PacketKind::from_byte(byte);
            assert_eq!(kind.as_byte(), byte);
        }
    }

    #[test]
    fn test_cleartext_rule() {
        assert!(PacketKind::Hello.is_cleartext());
        assert!(PacketKind::SessionKey.is_cleartext());
        assert!(!PacketKind::Ping.is_cleartext());
        assert!(!PacketKind::Unknown(0xfe).is_cleartext());
    }

    #[test]
    fn test_unknown_discriminant_is_carried() {
        let kind = PacketKind::from_byte(0xaa);
        assert_eq!(kind, PacketKind::Unknown(0xaa));
        assert_eq!(kind.name(), "Unknown");
    }
}
