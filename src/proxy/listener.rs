//! # Proxy Listener
//!
//! Accepts incoming client connections, resolves the upstream address
//! (configured override or the negotiation endpoint), and spawns one
//! session task per accepted pair.
//!
//! Session failures are contained: a fatal session error produces a
//! structured log entry with the session identity and cause, and the
//! listener keeps accepting new connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{CipherKeySource, RelayConfig};
use crate::error::{ProxyError, Result};
use crate::protocol::hooks::HookDispatcher;
use crate::proxy::session::{Session, SessionSettings};
use crate::service::negotiate::negotiate_upstream;

/// Accept loop plus the pieces every session shares read-only
pub struct ProxyListener {
    config: RelayConfig,
    hooks: Arc<HookDispatcher>,
    static_key: Option<Vec<u8>>,
}

impl ProxyListener {
    /// Build a listener over a frozen hook registry.
    ///
    /// # Errors
    /// Configuration problems (bad addresses, malformed key material) are
    /// fatal here - the listener never starts with a half-valid setup.
    pub fn new(config: RelayConfig, hooks: Arc<HookDispatcher>) -> Result<Self> {
        config.validate_strict()?;
        let static_key = config.proxy.static_key_material()?;

        Ok(Self {
            config,
            hooks,
            static_key,
        })
    }

    /// Run the accept loop until ctrl-c.
    #[instrument(skip(self), fields(listen = %self.config.proxy.listen_address))]
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Run the accept loop with an external shutdown channel.
    pub async fn run_with_shutdown(self, shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.proxy.listen_address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Run the accept loop over an already-bound socket.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Listening for client connections");

        let active_sessions = Arc::new(Mutex::new(0u32));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down listener. Waiting for sessions to close...");

                    let timeout = tokio::time::sleep(Duration::from_secs(10));
                    tokio::pin!(timeout);

                    loop {
                        tokio::select! {
                            _ = &mut timeout => {
                                warn!("Shutdown timeout reached, forcing exit");
                                break;
                            }
                            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                                let sessions = *active_sessions.lock().await;
                                info!(sessions = %sessions, "Waiting for sessions to close");
                                if sessions == 0 {
                                    info!("All sessions closed, shutting down");
                                    break;
                                }
                            }
                        }
                    }

                    return Ok(());
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "Client connected");
                            let active_sessions = active_sessions.clone();

                            {
                                let mut count = active_sessions.lock().await;
                                *count += 1;
                            }

                            let config = self.config.clone();
                            let hooks = self.hooks.clone();
                            let static_key = self.static_key.clone();

                            tokio::spawn(async move {
                                if let Err(e) = serve_session(stream, config, hooks, static_key).await {
                                    error!(peer = %peer, error = %e, "Session terminated with error");
                                }

                                let mut count = active_sessions.lock().await;
                                *count -= 1;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }
}

/// Resolve the upstream and relay one accepted client.
///
/// Runs inside the per-session task so negotiation never blocks the accept
/// loop.
async fn serve_session(
    client: TcpStream,
    config: RelayConfig,
    hooks: Arc<HookDispatcher>,
    static_key: Option<Vec<u8>>,
) -> Result<()> {
    let proxy = &config.proxy;

    let (upstream_address, negotiated_key) = match &proxy.upstream_address_override {
        Some(address) => (address.clone(), None),
        None => {
            let endpoint = proxy
                .negotiation_endpoint
                .as_deref()
                .ok_or_else(|| ProxyError::Config("No upstream source configured".into()))?;
            let negotiated = negotiate_upstream(endpoint).await?;
            (negotiated.upstream_address, negotiated.key_material)
        }
    };

    let configured_key = match &proxy.cipher_key_source {
        CipherKeySource::Packet => None,
        CipherKeySource::Static { .. } => static_key,
        CipherKeySource::Negotiated => Some(negotiated_key.ok_or_else(|| {
            ProxyError::Negotiation("Endpoint returned no session key material".into())
        })?),
    };

    let settings = SessionSettings {
        max_packet_size: proxy.max_packet_size,
        connect_timeout: proxy.connect_timeout,
        keepalive_interval: proxy.keepalive_interval,
        configured_key,
    };

    Session::establish(client, &upstream_address, settings, hooks).await
}
