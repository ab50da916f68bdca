//! # Error Types
//!
//! Comprehensive error handling for the relay proxy.
//!
//! This module defines all error variants that can occur while relaying a
//! session, from low-level I/O errors to protocol violations on the wire.
//!
//! ## Error Categories
//! - **Configuration Errors**: invalid keys or addresses - fatal at startup
//! - **Protocol Errors**: malformed framing, oversized packets, cipher
//!   desynchronization - fatal to the single session
//! - **Codec Errors**: malformed variant records - recoverable, the offending
//!   packet is dropped and the session continues
//! - **I/O Errors**: socket failures - fatal to the session
//! - **Hook Errors**: interceptor callback faults - isolated and logged
//!
//! All errors implement `std::error::Error` for interoperability. Per-session
//! errors never cross into the listener or other sessions.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Framing and protocol validation errors
    pub const ERR_INVALID_HEADER: &str = "Invalid packet header";
    pub const ERR_OVERSIZED_PACKET: &str = "Packet exceeds maximum size";
    pub const ERR_CLEARTEXT_AFTER_KEYS: &str =
        "Cleartext handshake packet received after cipher initialization";
    pub const ERR_ENCRYPTED_BEFORE_KEYS: &str =
        "Encrypted packet received before cipher initialization";

    /// Cipher errors
    pub const ERR_EMPTY_KEY: &str = "Cipher key material is empty";

    /// Variant record codec errors
    pub const ERR_TRUNCATED_RECORD: &str = "Truncated variant record";
    pub const ERR_UNKNOWN_TYPE_TAG: &str = "Unknown variant type tag";
    pub const ERR_TRAILING_BYTES: &str = "Trailing bytes after variant record";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECT_TIMEOUT: &str = "Upstream connect timed out";
    pub const ERR_TIMEOUT: &str = "Operation timed out";
}

/// ProxyError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Oversized packet: {0} bytes declared")]
    OversizedPacket(usize),

    #[error("Cleartext handshake packet received after cipher initialization")]
    CleartextAfterKeys,

    #[error("Encrypted packet received before cipher initialization")]
    EncryptedBeforeKeys,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Truncated variant record")]
    TruncatedRecord,

    #[error("Unknown variant type tag: {0:#04x}")]
    UnknownTypeTag(u8),

    #[error("Trailing bytes after variant record: {0} bytes")]
    TrailingBytes(usize),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Upstream connect timed out")]
    ConnectTimeout,

    #[error("Operation timed out")]
    Timeout,
}

impl ProxyError {
    /// Whether this error belongs to the recoverable codec class.
    ///
    /// Codec errors mean one packet carried a malformed variant record: the
    /// packet is dropped and logged, the session keeps relaying. Every other
    /// class is fatal to the session (or, for `Config`, to startup).
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            ProxyError::TruncatedRecord
                | ProxyError::UnknownTypeTag(_)
                | ProxyError::TrailingBytes(_)
        )
    }
}

/// Type alias for Results using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_class_is_recoverable() {
        assert!(ProxyError::TruncatedRecord.is_codec());
        assert!(ProxyError::UnknownTypeTag(0x7f).is_codec());
        assert!(ProxyError::TrailingBytes(3).is_codec());

        assert!(!ProxyError::InvalidHeader.is_codec());
        assert!(!ProxyError::OversizedPacket(1 << 20).is_codec());
        assert!(!ProxyError::ConnectionClosed.is_codec());
    }
}
