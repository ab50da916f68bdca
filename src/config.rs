//! # Configuration Management
//!
//! Centralized configuration for the relay proxy.
//!
//! This module provides structured configuration for the listener and the
//! per-session relay machinery: addresses, packet size limits, timeouts,
//! and where the per-session cipher key material comes from.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - CLI overrides applied by the binary
//!
//! ## Security Considerations
//! - `max_packet_size` bounds allocation per frame (oversized length fields
//!   close the session)
//! - `connect_timeout` bounds the upstream dial
//! - A configured cipher key must be non-empty; there is no cleartext
//!   fallback

use crate::error::{ProxyError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max payload length expressible by the wire format's u16 length field
pub const WIRE_MAX_PACKET_SIZE: usize = u16::MAX as usize;

/// Default cap on declared payload length
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Proxy-specific configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProxyError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProxyError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.proxy.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Where the per-session cipher key material comes from
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CipherKeySource {
    /// The payload of the key-bearing handshake packet is the material
    #[default]
    Packet,
    /// Fixed material configured as hex
    Static { key_hex: String },
    /// Material returned by the negotiation endpoint
    Negotiated,
}

/// Proxy-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Listen address for client connections (e.g., "127.0.0.1:17091")
    pub listen_address: String,

    /// Dial this upstream address instead of the negotiated one
    pub upstream_address_override: Option<String>,

    /// HTTPS endpoint that returns the upstream address (and optionally
    /// session key material)
    pub negotiation_endpoint: Option<String>,

    /// Maximum declared payload length accepted by the framer
    pub max_packet_size: usize,

    /// Timeout for the upstream dial
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Send keepalive probes at this interval; absence of traffic alone
    /// never closes a session
    #[serde(default, with = "opt_duration_serde")]
    pub keepalive_interval: Option<Duration>,

    /// Cipher key material source
    #[serde(default)]
    pub cipher_key_source: CipherKeySource,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("127.0.0.1:17091"),
            upstream_address_override: None,
            negotiation_endpoint: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            connect_timeout: timeout::CONNECT_TIMEOUT,
            keepalive_interval: None,
            cipher_key_source: CipherKeySource::Packet,
        }
    }
}

impl ProxyConfig {
    /// Validate proxy configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.listen_address.is_empty() {
            errors.push("Listen address cannot be empty".to_string());
        } else if self.listen_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid listen address format: '{}' (expected format: '0.0.0.0:17091')",
                self.listen_address
            ));
        }

        match &self.upstream_address_override {
            Some(addr) if addr.is_empty() || !addr.contains(':') => {
                errors.push(format!(
                    "Invalid upstream address: '{addr}' (expected format: 'host:port')"
                ));
            }
            Some(_) => {}
            None if self.negotiation_endpoint.is_none() => {
                errors.push(
                    "Either upstream_address_override or negotiation_endpoint must be set"
                        .to_string(),
                );
            }
            None => {}
        }

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > WIRE_MAX_PACKET_SIZE {
            errors.push(format!(
                "Max packet size too large: {} bytes (wire format maximum: {})",
                self.max_packet_size, WIRE_MAX_PACKET_SIZE
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if let Some(interval) = self.keepalive_interval {
            if interval.as_millis() < 100 {
                errors.push("Keepalive interval too short (minimum: 100ms)".to_string());
            }
        }

        if let CipherKeySource::Static { key_hex } = &self.cipher_key_source {
            match decode_hex(key_hex) {
                Ok(bytes) if bytes.is_empty() => {
                    errors.push("Static cipher key cannot be empty".to_string());
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("Invalid static cipher key: {e}")),
            }
        }

        if matches!(self.cipher_key_source, CipherKeySource::Negotiated)
            && self.negotiation_endpoint.is_none()
        {
            errors.push(
                "cipher_key_source = negotiated requires negotiation_endpoint".to_string(),
            );
        }

        errors
    }

    /// Resolve configured static key material, if that source is selected
    pub fn static_key_material(&self) -> Result<Option<Vec<u8>>> {
        match &self.cipher_key_source {
            CipherKeySource::Static { key_hex } => decode_hex(key_hex)
                .map(Some)
                .map_err(|e| ProxyError::Config(format!("Invalid static cipher key: {e}"))),
            _ => Ok(None),
        }
    }
}

/// Decode a hex string into bytes
pub fn decode_hex(hex: &str) -> std::result::Result<Vec<u8>, String> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("invalid hex at offset {i}"))
        })
        .collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-relay"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for Option<Duration> fields
mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .as_ref()
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_upstream_or_endpoint() {
        let config = RelayConfig::default();
        let errors = config.validate();
        assert!(errors
            .iter()
            .any(|e| e.contains("upstream_address_override")));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.proxy.upstream_address_override = Some("game.example.net:17091".into());
        });
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml = r#"
            [proxy]
            listen_address = "0.0.0.0:17091"
            upstream_address_override = "game.example.net:17091"
            max_packet_size = 4096
            connect_timeout = 5000

            [proxy.cipher_key_source]
            source = "static"
            key_hex = "deadbeefcafe"

            [logging]
            app_name = "packet-relay"
            log_level = "debug"
            json_format = true
        "#;

        let config = RelayConfig::from_toml(toml).unwrap();
        assert_eq!(config.proxy.listen_address, "0.0.0.0:17091");
        assert_eq!(config.proxy.max_packet_size, 4096);
        assert_eq!(config.proxy.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert!(config.logging.json_format);

        let material = config.proxy.static_key_material().unwrap().unwrap();
        assert_eq!(material, vec![0xde, 0xad, 0xbe, 0xef, 0xca, 0xfe]);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_invalid_static_key_rejected() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.proxy.upstream_address_override = Some("game.example.net:17091".into());
            c.proxy.cipher_key_source = CipherKeySource::Static {
                key_hex: "not-hex".into(),
            };
        });
        assert!(config
            .validate()
            .iter()
            .any(|e| e.contains("Invalid static cipher key")));
    }

    #[test]
    fn test_oversized_max_packet_size_rejected() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.proxy.upstream_address_override = Some("game.example.net:17091".into());
            c.proxy.max_packet_size = WIRE_MAX_PACKET_SIZE + 1;
        });
        assert!(config
            .validate()
            .iter()
            .any(|e| e.contains("Max packet size too large")));
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert!(decode_hex("0").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
