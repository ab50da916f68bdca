//! # Cipher Streams
//!
//! Stateful symmetric keystream instances, seeded from per-session key
//! material. Encryption and decryption are the same operation; the internal
//! state advances by exactly the number of bytes transformed and is never
//! reset mid-session. Replaying state or skipping bytes desynchronizes the
//! stream irrecoverably for the rest of the session.
//!
//! Each relay direction owns an rx stream keyed for its inbound link and a
//! tx stream keyed for its outbound link, so a dropped packet never advances
//! the peer's keystream and the two directions share no mutable state.
//!
//! Key material is expanded into per-link keys with domain-separated SHA-256
//! and zeroized once the streams are built.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{constants, ProxyError, Result};

/// Which link of the session a stream is keyed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The socket facing the game client
    Client,
    /// The socket facing the real game server
    Server,
}

impl Link {
    fn label(self) -> &'static [u8] {
        match self {
            Link::Client => b"client_link",
            Link::Server => b"server_link",
        }
    }
}

/// Derive the 32-byte stream key for one link
fn derive_key(material: &[u8], link: Link) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(material);
    // Domain separation per link (order matters)
    hasher.update(b"link");
    hasher.update(link.label());
    hasher.finalize().into()
}

/// Derive the 12-byte stream IV for one link
fn derive_iv(key: &[u8; 32]) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(b"iv");
    let digest = hasher.finalize();
    let mut iv = [0u8; 12];
    iv.copy_from_slice(&digest[..12]);
    iv
}

/// One evolving keystream instance.
///
/// `transform` is its own inverse: applying it twice over the same span of
/// two freshly-seeded identical streams yields the original bytes.
pub struct CipherStream {
    cipher: ChaCha20,
    link: Link,
    position: u64,
}

impl std::fmt::Debug for CipherStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherStream")
            .field("link", &self.link)
            .field("position", &self.position)
            .finish()
    }
}

impl CipherStream {
    /// Seed a stream for one link from session key material.
    ///
    /// # Errors
    /// Missing or empty key material is a configuration error; there is no
    /// silent fallback to cleartext relaying.
    pub fn initialize(material: &[u8], link: Link) -> Result<Self> {
        if material.is_empty() {
            return Err(ProxyError::Config(constants::ERR_EMPTY_KEY.into()));
        }

        let mut key = derive_key(material, link);
        let iv = derive_iv(&key);
        let cipher = ChaCha20::new(&key.into(), &iv.into());
        key.zeroize();

        Ok(Self {
            cipher,
            link,
            position: 0,
        })
    }

    /// Apply the keystream in place, advancing the internal state by
    /// exactly `buffer.len()` bytes.
    pub fn transform(&mut self, buffer: &mut [u8]) {
        self.cipher.apply_keystream(buffer);
        self.position += buffer.len() as u64;
    }

    /// Total bytes transformed since initialization
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Which link this stream is keyed for
    pub fn link(&self) -> Link {
        self.link
    }
}

/// The four stream states of one session, grouped by the pump that owns them.
///
/// Two logically independent keystreams exist per link; the client→server
/// pump takes (rx=client, tx=server) and the server→client pump takes the
/// mirror pair. Built once, when the key-bearing handshake packet is
/// observed.
#[derive(Debug)]
pub struct SessionCiphers {
    /// client→server pump: decrypts client traffic, re-encrypts for the server
    pub client_to_server: DirectionCiphers,
    /// server→client pump: decrypts server traffic, re-encrypts for the client
    pub server_to_client: DirectionCiphers,
}

/// The rx/tx cipher pair owned exclusively by one relay direction
#[derive(Debug)]
pub struct DirectionCiphers {
    pub rx: CipherStream,
    pub tx: CipherStream,
}

impl SessionCiphers {
    pub fn initialize(mut material: Vec<u8>) -> Result<Self> {
        let ciphers = Self {
            client_to_server: DirectionCiphers {
                rx: CipherStream::initialize(&material, Link::Client)?,
                tx: CipherStream::initialize(&material, Link::Server)?,
            },
            server_to_client: DirectionCiphers {
                rx: CipherStream::initialize(&material, Link::Server)?,
                tx: CipherStream::initialize(&material, Link::Client)?,
            },
        };

        material.zeroize();
        Ok(ciphers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_is_involutive_from_fresh_state() {
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();

        let mut forward = CipherStream::initialize(b"session-key", Link::Client).unwrap();
        let mut backward = CipherStream::initialize(b"session-key", Link::Client).unwrap();

        let mut buffer = original.clone();
        forward.transform(&mut buffer);
        assert_ne!(buffer, original);

        backward.transform(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_state_advances_by_exactly_bytes_processed() {
        let mut stream = CipherStream::initialize(b"session-key", Link::Server).unwrap();
        assert_eq!(stream.position(), 0);

        stream.transform(&mut [0u8; 7]);
        assert_eq!(stream.position(), 7);

        stream.transform(&mut []);
        assert_eq!(stream.position(), 7);

        stream.transform(&mut [0u8; 100]);
        assert_eq!(stream.position(), 107);
    }

    #[test]
    fn test_links_use_independent_keystreams() {
        let mut client = CipherStream::initialize(b"session-key", Link::Client).unwrap();
        let mut server = CipherStream::initialize(b"session-key", Link::Server).unwrap();

        let mut a = vec![0u8; 32];
        let mut b = vec![0u8; 32];
        client.transform(&mut a);
        server.transform(&mut b);

        // Same material, different link labels: different keystreams
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_key_is_configuration_error() {
        match CipherStream::initialize(&[], Link::Client) {
            Err(ProxyError::Config(_)) => {}
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_session_ciphers_pair_up() {
        let ciphers = SessionCiphers::initialize(b"session-key".to_vec()).unwrap();

        assert_eq!(ciphers.client_to_server.rx.link(), Link::Client);
        assert_eq!(ciphers.client_to_server.tx.link(), Link::Server);
        assert_eq!(ciphers.server_to_client.rx.link(), Link::Server);
        assert_eq!(ciphers.server_to_client.tx.link(), Link::Client);
    }

    #[test]
    fn test_relay_chain_preserves_payload() {
        // What the proxy does to one client→server packet: the client
        // encrypts, the proxy decrypts with its client-link rx stream and
        // re-encrypts with its server-link tx stream, the server decrypts.
        let mut client_side = CipherStream::initialize(b"k", Link::Client).unwrap();
        let mut ciphers = SessionCiphers::initialize(b"k".to_vec()).unwrap();
        let mut server_side = CipherStream::initialize(b"k", Link::Server).unwrap();

        let mut payload = b"ping".to_vec();
        client_side.transform(&mut payload);
        ciphers.client_to_server.rx.transform(&mut payload);
        assert_eq!(payload, b"ping");

        ciphers.client_to_server.tx.transform(&mut payload);
        server_side.transform(&mut payload);
        assert_eq!(payload, b"ping");
    }
}
