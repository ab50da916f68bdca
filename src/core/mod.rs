//! # Core Protocol Components
//!
//! Low-level packet handling, framing, and the variant record codec.
//!
//! This module is the foundation of the relay: it turns raw byte streams
//! into discrete packets and back, and gives hooks structured access to
//! variant-bearing payloads.
//!
//! ## Components
//! - **Packet**: typed message with a one-byte discriminant
//! - **Codec**: tokio codec for framing over byte streams
//! - **Variant**: ordered typed key/value record codec
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [Length(2, LE)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Declared length is validated against the configured maximum before
//!   allocation
//! - Variant record decoding must consume its input exactly

pub mod codec;
pub mod packet;
pub mod variant;
