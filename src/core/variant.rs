//! # Variant Record Codec
//!
//! (De)serializes the protocol's typed key/value attribute lists carried
//! inside variant-bearing packets.
//!
//! A record is an ordered sequence of entries; each entry has a name, a type
//! tag, and a value. Ordering is preserved on the wire and in memory, since
//! some consumers rely on positional meaning despite named keys.
//!
//! ## Wire Format
//! ```text
//! [Count(2, LE)] then per entry:
//! [NameLen(1)] [Name(NameLen)] [Tag(1)] [Value(...)]
//! ```
//!
//! Numeric values are fixed width, little endian; strings and byte arrays
//! are u16-length-prefixed. Decoding must consume the input exactly -
//! truncated entries, unknown tags, and trailing bytes are codec errors.
//! These are non-fatal to the session: the enclosing packet is treated as
//! malformed and dropped rather than crashing the relay.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ProxyError, Result};

/// Type tag bytes on the wire. The gap before `SIGNED` matches the original
/// protocol's numbering and must not be compacted.
const TAG_FLOAT: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_VEC2: u8 = 3;
const TAG_VEC3: u8 = 4;
const TAG_UNSIGNED: u8 = 5;
const TAG_SIGNED: u8 = 9;
const TAG_BYTES: u8 = 10;

/// A typed value inside a variant record
#[derive(Debug, Clone, PartialEq)]
pub enum VariantValue {
    Float(f32),
    String(String),
    Vec2(f32, f32),
    Vec3(f32, f32, f32),
    Unsigned(u32),
    Signed(i32),
    Bytes(Vec<u8>),
}

impl VariantValue {
    /// Get the wire tag for this value
    pub fn tag(&self) -> u8 {
        match self {
            VariantValue::Float(_) => TAG_FLOAT,
            VariantValue::String(_) => TAG_STRING,
            VariantValue::Vec2(..) => TAG_VEC2,
            VariantValue::Vec3(..) => TAG_VEC3,
            VariantValue::Unsigned(_) => TAG_UNSIGNED,
            VariantValue::Signed(_) => TAG_SIGNED,
            VariantValue::Bytes(_) => TAG_BYTES,
        }
    }
}

/// One named, typed entry
#[derive(Debug, Clone, PartialEq)]
pub struct VariantEntry {
    pub name: String,
    pub value: VariantValue,
}

/// An ordered sequence of typed entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantRecord {
    entries: Vec<VariantEntry>,
}

impl VariantRecord {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry, preserving insertion order
    pub fn push(&mut self, name: impl Into<String>, value: VariantValue) {
        self.entries.push(VariantEntry {
            name: name.into(),
            value,
        });
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[VariantEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given name, if any
    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    /// Serialize to the wire encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u16_le(self.entries.len() as u16);

        for entry in &self.entries {
            buf.put_u8(entry.name.len() as u8);
            buf.put_slice(entry.name.as_bytes());
            buf.put_u8(entry.value.tag());

            match &entry.value {
                VariantValue::Float(v) => buf.put_f32_le(*v),
                VariantValue::String(s) => {
                    buf.put_u16_le(s.len() as u16);
                    buf.put_slice(s.as_bytes());
                }
                VariantValue::Vec2(x, y) => {
                    buf.put_f32_le(*x);
                    buf.put_f32_le(*y);
                }
                VariantValue::Vec3(x, y, z) => {
                    buf.put_f32_le(*x);
                    buf.put_f32_le(*y);
                    buf.put_f32_le(*z);
                }
                VariantValue::Unsigned(v) => buf.put_u32_le(*v),
                VariantValue::Signed(v) => buf.put_i32_le(*v),
                VariantValue::Bytes(b) => {
                    buf.put_u16_le(b.len() as u16);
                    buf.put_slice(b);
                }
            }
        }

        buf.to_vec()
    }

    /// Parse the wire encoding. The input must be consumed exactly.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.remaining() < 2 {
            return Err(ProxyError::TruncatedRecord);
        }
        let count = bytes.get_u16_le() as usize;

        let mut entries = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            entries.push(Self::decode_entry(&mut bytes)?);
        }

        if bytes.has_remaining() {
            return Err(ProxyError::TrailingBytes(bytes.remaining()));
        }

        Ok(Self { entries })
    }

    fn decode_entry(bytes: &mut &[u8]) -> Result<VariantEntry> {
        if bytes.remaining() < 1 {
            return Err(ProxyError::TruncatedRecord);
        }
        let name_len = bytes.get_u8() as usize;
        if bytes.remaining() < name_len + 1 {
            return Err(ProxyError::TruncatedRecord);
        }
        let name = String::from_utf8(bytes[..name_len].to_vec())
            .map_err(|_| ProxyError::TruncatedRecord)?;
        bytes.advance(name_len);

        let tag = bytes.get_u8();
        let value = match tag {
            TAG_FLOAT => {
                Self::need(bytes, 4)?;
                VariantValue::Float(bytes.get_f32_le())
            }
            TAG_STRING => {
                Self::need(bytes, 2)?;
                let len = bytes.get_u16_le() as usize;
                Self::need(bytes, len)?;
                let s = String::from_utf8(bytes[..len].to_vec())
                    .map_err(|_| ProxyError::TruncatedRecord)?;
                bytes.advance(len);
                VariantValue::String(s)
            }
            TAG_VEC2 => {
                Self::need(bytes, 8)?;
                VariantValue::Vec2(bytes.get_f32_le(), bytes.get_f32_le())
            }
            TAG_VEC3 => {
                Self::need(bytes, 12)?;
                VariantValue::Vec3(bytes.get_f32_le(), bytes.get_f32_le(), bytes.get_f32_le())
            }
            TAG_UNSIGNED => {
                Self::need(bytes, 4)?;
                VariantValue::Unsigned(bytes.get_u32_le())
            }
            TAG_SIGNED => {
                Self::need(bytes, 4)?;
                VariantValue::Signed(bytes.get_i32_le())
            }
            TAG_BYTES => {
                Self::need(bytes, 2)?;
                let len = bytes.get_u16_le() as usize;
                Self::need(bytes, len)?;
                let b = bytes[..len].to_vec();
                bytes.advance(len);
                VariantValue::Bytes(b)
            }
            other => return Err(ProxyError::UnknownTypeTag(other)),
        };

        Ok(VariantEntry { name, value })
    }

    fn need(bytes: &&[u8], n: usize) -> Result<()> {
        if bytes.remaining() < n {
            Err(ProxyError::TruncatedRecord)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> VariantRecord {
        let mut record = VariantRecord::new();
        record.push("OnSpawn", VariantValue::String("hello".into()));
        record.push("netID", VariantValue::Unsigned(42));
        record.push("delta", VariantValue::Signed(-7));
        record.push("pos", VariantValue::Vec2(3.5, -1.25));
        record.push("color", VariantValue::Vec3(0.1, 0.2, 0.3));
        record.push("speed", VariantValue::Float(12.75));
        record.push("blob", VariantValue::Bytes(vec![0, 255, 1, 254]));
        record
    }

    #[test]
    fn test_roundtrip() {
        let record = sample();
        let encoded = record.encode();
        let decoded = VariantRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_order_preserved() {
        let record = sample();
        let decoded = VariantRecord::decode(&record.encode()).unwrap();
        let names: Vec<&str> = decoded.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["OnSpawn", "netID", "delta", "pos", "color", "speed", "blob"]
        );
    }

    #[test]
    fn test_truncated_record() {
        let encoded = sample().encode();
        for cut in 1..encoded.len() {
            let err = VariantRecord::decode(&encoded[..cut]).unwrap_err();
            assert!(err.is_codec(), "cut at {cut} gave {err:?}");
        }
    }

    #[test]
    fn test_unknown_tag() {
        // count=1, name "x", tag 0x2a
        let bytes = [1, 0, 1, b'x', 0x2a];
        match VariantRecord::decode(&bytes) {
            Err(ProxyError::UnknownTypeTag(0x2a)) => {}
            other => panic!("expected UnknownTypeTag, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded = sample().encode();
        encoded.push(0);
        match VariantRecord::decode(&encoded) {
            Err(ProxyError::TrailingBytes(1)) => {}
            other => panic!("expected TrailingBytes, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_record() {
        let record = VariantRecord::new();
        let decoded = VariantRecord::decode(&record.encode()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_get_by_name() {
        let record = sample();
        assert_eq!(record.get("netID"), Some(&VariantValue::Unsigned(42)));
        assert_eq!(record.get("missing"), None);
    }
}
