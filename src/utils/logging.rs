//! Structured logging initialization.
//!
//! The proxy core emits structured `tracing` events; this module wires them
//! to a subscriber according to [`LoggingConfig`](crate::config::LoggingConfig).
//! Fatal session errors carry the session id and cause as fields, so a JSON
//! sink can index them.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProxyError, Result};

/// Install the global subscriber from configuration.
///
/// The `RUST_LOG` environment variable, when set, refines the configured
/// level per target.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let result = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| ProxyError::Config(format!("Failed to install subscriber: {e}")))
}
