//! # Session
//!
//! One end-to-end relayed connection pairing a game client and the real
//! server. The session owns both sockets, both receive buffers, and all four
//! cipher stream states exclusively; nothing else mutates them.
//!
//! ## State Machine
//! `Connecting` (upstream dial in progress) → `Relaying` (bidirectional pump
//! active) → `Closing` (one side closed, draining) → `Closed` (terminal).
//!
//! The transition into `Relaying` happens only after both sockets are up and
//! the cleartext handshake has produced cipher streams. In `Relaying` each
//! direction is pumped by its own task; the two pumps share nothing but a
//! watch-channel lifecycle flag. Closing the socket halves is the
//! cancellation mechanism for in-flight reads.
//!
//! Every per-session error is contained here: the listener and other
//! sessions never observe it beyond a structured log entry.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::core::codec::PacketCodec;
use crate::core::packet::{Packet, PacketKind};
use crate::error::{ProxyError, Result};
use crate::protocol::cipher::{DirectionCiphers, SessionCiphers};
use crate::protocol::hooks::{Action, Direction, HookContext, HookDispatcher};
use crate::utils::timeout::{with_timeout_error, SHUTDOWN_TIMEOUT};

type Reader = tokio_util::codec::FramedRead<OwnedReadHalf, PacketCodec>;
type Writer = tokio_util::codec::FramedWrite<OwnedWriteHalf, PacketCodec>;

/// Connection lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Relaying,
    Closing,
    Closed,
}

/// Per-session relay parameters, resolved by the listener
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Cap on declared payload length
    pub max_packet_size: usize,
    /// Bound on the upstream dial
    pub connect_timeout: Duration,
    /// Inject empty keepalive probes toward the server at this interval
    pub keepalive_interval: Option<Duration>,
    /// Key material from configuration or negotiation; `None` means the
    /// key-bearing handshake packet carries it
    pub configured_key: Option<Vec<u8>>,
}

/// One relayed client/server pair
pub struct Session {
    id: u32,
    state: SessionState,
}

impl Session {
    /// Dial the upstream and relay until either side closes or a fatal
    /// error occurs. Consumes the accepted client socket.
    ///
    /// Fatal session errors are returned to the caller for logging; they
    /// are never fatal to the process.
    #[instrument(skip_all, fields(session = tracing::field::Empty, upstream = %upstream_address))]
    pub async fn establish(
        client: TcpStream,
        upstream_address: &str,
        settings: SessionSettings,
        hooks: Arc<HookDispatcher>,
    ) -> Result<()> {
        let id = rand::random::<u32>();
        tracing::Span::current().record("session", id);

        let mut session = Session {
            id,
            state: SessionState::Connecting,
        };

        let server = with_timeout_error(
            async { Ok(TcpStream::connect(upstream_address).await?) },
            settings.connect_timeout,
        )
        .await
        .map_err(|e| match e {
            ProxyError::Timeout => ProxyError::ConnectTimeout,
            other => other,
        })?;

        debug!("Upstream connected; awaiting cleartext handshake");
        session.relay(client, server, settings, hooks).await
    }

    async fn relay(
        &mut self,
        client: TcpStream,
        server: TcpStream,
        settings: SessionSettings,
        hooks: Arc<HookDispatcher>,
    ) -> Result<()> {
        let codec = PacketCodec::new(settings.max_packet_size);
        let (client_read, client_write) = client.into_split();
        let (server_read, server_write) = server.into_split();

        let mut client_reader = Reader::new(client_read, codec.clone());
        let mut server_reader = Reader::new(server_read, codec.clone());
        let mut client_writer = Writer::new(client_write, codec.clone());
        let mut server_writer = Writer::new(server_write, codec);

        let ciphers = self
            .handshake(
                &mut client_reader,
                &mut server_reader,
                &mut client_writer,
                &mut server_writer,
                &settings,
                &hooks,
            )
            .await?;

        self.state = SessionState::Relaying;
        info!("Ciphers initialized; session relaying");

        let (closing_tx, closing_rx) = watch::channel(false);
        let closing_tx = Arc::new(closing_tx);

        let SessionCiphers {
            client_to_server,
            server_to_client,
        } = ciphers;

        let mut c2s = tokio::spawn(pump(
            client_reader,
            server_writer,
            client_to_server,
            Direction::ClientToServer,
            hooks.clone(),
            self.id,
            settings.keepalive_interval,
            closing_tx.clone(),
            closing_rx.clone(),
        ));
        let mut s2c = tokio::spawn(pump(
            server_reader,
            client_writer,
            server_to_client,
            Direction::ServerToClient,
            hooks,
            self.id,
            None,
            closing_tx,
            closing_rx,
        ));

        // Either pump finishing (EOF or error) moves the session to Closing;
        // the watch flag tells the peer pump to drain and release its
        // sockets, which completes the transition to Closed.
        let (first, remaining) = tokio::select! {
            result = &mut c2s => (result, s2c),
            result = &mut s2c => (result, c2s),
        };

        self.state = SessionState::Closing;
        debug!("Session closing; draining peer direction");

        let second = remaining.await;
        self.state = SessionState::Closed;
        debug!("Session closed; sockets and cipher states released");

        match (first, second) {
            (Ok(a), Ok(b)) => a.and(b),
            _ => Err(ProxyError::Protocol("relay pump panicked".into())),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session identity carried in every structured log entry
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Forward the cleartext handshake until the key-bearing packet arrives,
    /// then build the cipher streams.
    ///
    /// Encrypted-type packets before that point are a protocol error; there
    /// is no silent fallback to unencrypted relaying.
    async fn handshake(
        &mut self,
        client_reader: &mut Reader,
        server_reader: &mut Reader,
        client_writer: &mut Writer,
        server_writer: &mut Writer,
        settings: &SessionSettings,
        hooks: &Arc<HookDispatcher>,
    ) -> Result<SessionCiphers> {
        loop {
            let (packet, direction) = tokio::select! {
                maybe = client_reader.next() => {
                    (read_packet(maybe)?, Direction::ClientToServer)
                }
                maybe = server_reader.next() => {
                    (read_packet(maybe)?, Direction::ServerToClient)
                }
            };

            if !packet.kind.is_cleartext() {
                return Err(ProxyError::EncryptedBeforeKeys);
            }

            // Ciphers initialize on observation of the key-bearing packet;
            // the hook verdict below only affects forwarding.
            let ciphers = if packet.kind == PacketKind::SessionKey {
                let material = match &settings.configured_key {
                    Some(key) => key.clone(),
                    None => packet.payload.clone(),
                };
                Some(SessionCiphers::initialize(material)?)
            } else {
                None
            };

            let ctx = HookContext {
                session_id: self.id,
                direction,
            };
            let outbound = match hooks.dispatch(&packet, &ctx) {
                Action::Forward => Some(packet),
                Action::Replace(replacement) => Some(replacement),
                Action::Drop => {
                    debug!(direction = direction.name(), "Handshake packet dropped by hook");
                    None
                }
            };

            if let Some(outbound) = outbound {
                let writer = match direction {
                    Direction::ClientToServer => &mut *server_writer,
                    Direction::ServerToClient => &mut *client_writer,
                };
                writer.send(outbound).await?;
            }

            if let Some(ciphers) = ciphers {
                return Ok(ciphers);
            }
        }
    }
}

fn read_packet(maybe: Option<Result<Packet>>) -> Result<Packet> {
    match maybe {
        Some(Ok(packet)) => Ok(packet),
        Some(Err(e)) => Err(e),
        None => Err(ProxyError::ConnectionClosed),
    }
}

/// Pump one direction: read, decrypt, dispatch, re-encrypt, forward.
///
/// Owns its reader, writer, and rx/tx cipher pair exclusively. Packets are
/// forwarded in the exact order extracted from the byte stream.
#[allow(clippy::too_many_arguments)]
async fn pump(
    mut source: Reader,
    mut sink: Writer,
    mut ciphers: DirectionCiphers,
    direction: Direction,
    hooks: Arc<HookDispatcher>,
    session_id: u32,
    keepalive_interval: Option<Duration>,
    closing_tx: Arc<watch::Sender<bool>>,
    mut closing_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut keepalive = keepalive_interval.map(tokio::time::interval);
    if let Some(timer) = keepalive.as_mut() {
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer.reset();
    }

    let result = loop {
        let mut packet = tokio::select! {
            // The peer pump closed: stop reading, drain, release sockets
            _ = closing_rx.changed() => break Ok(()),

            _ = async {
                match keepalive.as_mut() {
                    Some(timer) => { timer.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                // Empty probe: no payload bytes, so no keystream advances
                if let Err(e) = sink.send(Packet::new(PacketKind::Ping, Vec::new())).await {
                    break Err(e);
                }
                continue;
            }

            maybe = source.next() => match maybe {
                Some(Ok(packet)) => packet,
                Some(Err(e)) => break Err(e),
                // EOF from this side
                None => break Ok(()),
            },
        };

        if packet.kind.is_cleartext() {
            break Err(ProxyError::CleartextAfterKeys);
        }

        ciphers.rx.transform(&mut packet.payload);

        // Malformed variant records are a codec error: drop the packet,
        // keep the session. Everything else on this path is session-fatal.
        if packet.kind.is_variant_bearing() {
            if let Err(e) = packet.variant_record() {
                warn!(
                    session = session_id,
                    direction = direction.name(),
                    error = %e,
                    "Dropping packet with malformed variant record"
                );
                continue;
            }
        }

        let ctx = HookContext {
            session_id,
            direction,
        };
        match hooks.dispatch(&packet, &ctx) {
            Action::Forward => {}
            Action::Replace(replacement) => packet = replacement,
            Action::Drop => {
                debug!(
                    session = session_id,
                    direction = direction.name(),
                    kind = packet.kind.name(),
                    "Packet dropped by hook"
                );
                // rx advanced for the consumed bytes; tx must not, since the
                // peer never sees them
                continue;
            }
        }

        ciphers.tx.transform(&mut packet.payload);
        if let Err(e) = sink.send(packet).await {
            break Err(e);
        }
    };

    // Closing: drain buffered outbound bytes to the still-open side, then
    // drop the halves, which closes the sockets and unblocks the peer pump.
    let _ = with_timeout_error(
        async { Ok(sink.flush().await?) },
        SHUTDOWN_TIMEOUT,
    )
    .await;
    let _ = closing_tx.send_replace(true);

    match &result {
        Ok(()) => debug!(
            session = session_id,
            direction = direction.name(),
            "Relay direction closed"
        ),
        Err(e) => error!(
            session = session_id,
            direction = direction.name(),
            error = %e,
            "Relay direction failed"
        ),
    }

    result
}
