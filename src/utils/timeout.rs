//! Async timeout wrappers and shared timeout constants.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProxyError, Result};

/// Default timeout for blocking protocol operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on the upstream dial during `Connecting`
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keepalive probes when a keepalive policy is configured
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on draining buffered outbound bytes while `Closing`
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a future under a timeout, mapping expiry to `ProxyError::Timeout`
pub async fn with_timeout_error<F, T>(future: F, timeout: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ProxyError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_expiry_maps_to_error() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;

        assert!(matches!(result, Err(ProxyError::Timeout)));
    }

    #[tokio::test]
    async fn test_completed_future_passes_through() {
        let result = with_timeout_error(async { Ok(7u32) }, Duration::from_secs(1)).await;
        assert_eq!(result.ok(), Some(7));
    }
}
