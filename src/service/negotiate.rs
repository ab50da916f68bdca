//! # Upstream Negotiation
//!
//! Some deployments learn the real game server's address (and session key
//! material) from an HTTPS login/negotiation endpoint rather than static
//! configuration. The relay core treats that exchange as opaque: it consumes
//! only the returned address and key material.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::decode_hex;
use crate::error::{ProxyError, Result};

/// What the negotiation endpoint hands back
#[derive(Debug, Clone, Deserialize)]
pub struct NegotiationResponse {
    /// Upstream address to dial, "host:port"
    pub address: String,
    /// Optional per-session cipher key material, hex encoded
    #[serde(default)]
    pub session_key_hex: Option<String>,
}

/// Resolved outcome of the negotiation step
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub upstream_address: String,
    pub key_material: Option<Vec<u8>>,
}

/// Query the negotiation endpoint for the upstream address and key material.
///
/// # Errors
/// Any transport failure, non-success status, or malformed response body is
/// a `ProxyError::Negotiation`; the session being set up fails, the listener
/// keeps accepting.
#[instrument(skip(endpoint), fields(endpoint = %endpoint))]
pub async fn negotiate_upstream(endpoint: &str) -> Result<Negotiated> {
    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .build()
        .map_err(|e| ProxyError::Negotiation(format!("client build failed: {e}")))?;

    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|e| ProxyError::Negotiation(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(ProxyError::Negotiation(format!(
            "endpoint returned {}",
            response.status()
        )));
    }

    let body: NegotiationResponse = response
        .json()
        .await
        .map_err(|e| ProxyError::Negotiation(format!("malformed response: {e}")))?;

    if body.address.is_empty() || !body.address.contains(':') {
        return Err(ProxyError::Negotiation(format!(
            "malformed upstream address: '{}'",
            body.address
        )));
    }

    let key_material = match &body.session_key_hex {
        Some(hex) => Some(
            decode_hex(hex)
                .map_err(|e| ProxyError::Negotiation(format!("malformed session key: {e}")))?,
        ),
        None => None,
    };

    debug!(upstream = %body.address, has_key = key_material.is_some(), "Negotiated upstream");

    Ok(Negotiated {
        upstream_address: body.address,
        key_material,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_without_key() {
        let body: NegotiationResponse =
            serde_json::from_str(r#"{"address": "game.example.net:17091"}"#).unwrap();
        assert_eq!(body.address, "game.example.net:17091");
        assert!(body.session_key_hex.is_none());
    }

    #[test]
    fn test_response_parses_with_key() {
        let body: NegotiationResponse = serde_json::from_str(
            r#"{"address": "game.example.net:17091", "session_key_hex": "00ff"}"#,
        )
        .unwrap();
        assert_eq!(body.session_key_hex.as_deref(), Some("00ff"));
    }
}
