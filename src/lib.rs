//! # packet-relay
//!
//! An intercepting relay proxy for session-keyed binary game protocols.
//!
//! The proxy sits between a game client and the real server, forwarding
//! traffic transparently while decrypting, inspecting, optionally
//! modifying, and re-encrypting every packet. Operator-supplied hooks can
//! observe, rewrite, or drop packets in flight.
//!
//! ## Architecture
//! - [`core`] - packet model, framing codec, variant record codec
//! - [`protocol`] - per-session cipher streams and the hook dispatcher
//! - [`proxy`] - listener accept loop and the session relay state machine
//! - [`service`] - upstream negotiation client
//! - [`config`] / [`error`] / [`utils`] - configuration, error taxonomy,
//!   logging and timeout helpers
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use packet_relay::config::RelayConfig;
//! use packet_relay::protocol::hooks::{Action, HookDispatcher, Matcher};
//! use packet_relay::proxy::ProxyListener;
//!
//! # async fn run() -> packet_relay::error::Result<()> {
//! let config = RelayConfig::default_with_overrides(|c| {
//!     c.proxy.upstream_address_override = Some("game.example.net:17091".into());
//! });
//!
//! // Register hooks before any session starts; the registry is then frozen.
//! let mut hooks = HookDispatcher::new();
//! hooks.register("observer", Matcher::any(), 0, |packet, ctx| {
//!     tracing::info!(session = ctx.session_id, kind = packet.kind.name(), "packet");
//!     Ok(Action::Forward)
//! });
//!
//! ProxyListener::new(config, Arc::new(hooks))?.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod proxy;
pub mod service;
pub mod utils;

pub use crate::core::packet::{Packet, PacketKind};
pub use crate::core::variant::{VariantRecord, VariantValue};
pub use crate::error::{ProxyError, Result};
pub use crate::protocol::hooks::{Action, Direction, HookContext, HookDispatcher, Matcher};
pub use crate::proxy::ProxyListener;
