//! # Hook Dispatcher
//!
//! Ordered registry of interceptors, invoked on every decoded packet before
//! re-encoding and forwarding. Hooks let operator-supplied logic observe,
//! rewrite, or drop packets in flight.
//!
//! Registration happens at startup, before any session begins; the registry
//! is then frozen behind an `Arc` and iterated read-only from every session
//! context concurrently. Callbacks must not block the relay for unbounded
//! time. A callback that fails is logged and treated as pass-through - one
//! misbehaving hook cannot take down a session.
//!
//! ## Ordering
//! Callbacks run in descending priority; equal priorities run in
//! registration order. The first decisive action (replace or drop) wins and
//! short-circuits the remaining callbacks for that packet.

use std::cmp::Reverse;

use tracing::warn;

use crate::core::packet::{Packet, PacketKind};
use crate::error::Result;

/// Which way a packet is travelling through the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// Get human-readable name, used in log fields
    pub fn name(self) -> &'static str {
        match self {
            Direction::ClientToServer => "client->server",
            Direction::ServerToClient => "server->client",
        }
    }
}

/// Predicate deciding which packets a hook sees
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    /// Restrict to one packet type; `None` matches every type
    pub kind: Option<PacketKind>,
    /// Restrict to one direction; `None` matches both
    pub direction: Option<Direction>,
}

impl Matcher {
    /// Match every packet in both directions
    pub fn any() -> Self {
        Self::default()
    }

    /// Match one packet type in both directions
    pub fn kind(kind: PacketKind) -> Self {
        Self {
            kind: Some(kind),
            direction: None,
        }
    }

    /// Further restrict this matcher to one direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    fn matches(&self, packet: &Packet, direction: Direction) -> bool {
        if let Some(kind) = self.kind {
            if packet.kind != kind {
                return false;
            }
        }
        if let Some(d) = self.direction {
            if d != direction {
                return false;
            }
        }
        true
    }
}

/// What a hook decided about a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Leave the packet as-is and keep evaluating hooks
    Forward,
    /// Substitute a new packet; decisive
    Replace(Packet),
    /// Suppress the packet entirely; decisive
    Drop,
}

/// Session identity handed to callbacks alongside the packet
#[derive(Debug, Clone, Copy)]
pub struct HookContext {
    pub session_id: u32,
    pub direction: Direction,
}

type HookFn = dyn Fn(&Packet, &HookContext) -> Result<Action> + Send + Sync + 'static;

struct Registration {
    matcher: Matcher,
    priority: i32,
    sequence: u64,
    name: &'static str,
    callback: Box<HookFn>,
}

/// Ordered interceptor registry.
///
/// Mutation is only possible before the dispatcher is shared; once sessions
/// hold their `Arc<HookDispatcher>` the hot path is lock-free reads.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: Vec<Registration>,
    next_sequence: u64,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for packets selected by `matcher`.
    ///
    /// `name` identifies the hook in fault logs. Higher `priority` runs
    /// earlier; equal priorities keep registration order.
    pub fn register<F>(&mut self, name: &'static str, matcher: Matcher, priority: i32, callback: F)
    where
        F: Fn(&Packet, &HookContext) -> Result<Action> + Send + Sync + 'static,
    {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.hooks.push(Registration {
            matcher,
            priority,
            sequence,
            name,
            callback: Box::new(callback),
        });
        self.hooks
            .sort_by_key(|h| (Reverse(h.priority), h.sequence));
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run matching callbacks in order; first decisive action wins.
    ///
    /// A callback error is logged and treated as pass-through - it never
    /// propagates into the relay loop.
    pub fn dispatch(&self, packet: &Packet, ctx: &HookContext) -> Action {
        for hook in &self.hooks {
            if !hook.matcher.matches(packet, ctx.direction) {
                continue;
            }

            match (hook.callback)(packet, ctx) {
                Ok(Action::Forward) => {}
                Ok(decisive) => return decisive,
                Err(e) => {
                    warn!(
                        session = ctx.session_id,
                        hook = hook.name,
                        direction = ctx.direction.name(),
                        error = %e,
                        "Hook failed; treating as pass-through"
                    );
                }
            }
        }

        Action::Forward
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx(direction: Direction) -> HookContext {
        HookContext {
            session_id: 1,
            direction,
        }
    }

    fn ping() -> Packet {
        Packet::new(PacketKind::Ping, b"ping".to_vec())
    }

    #[test]
    fn test_empty_registry_forwards() {
        let dispatcher = HookDispatcher::new();
        let action = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(action, Action::Forward);
    }

    #[test]
    fn test_higher_priority_decisive_action_wins() {
        let mut dispatcher = HookDispatcher::new();
        let low_invoked = Arc::new(AtomicUsize::new(0));

        let counter = low_invoked.clone();
        dispatcher.register("low", Matcher::kind(PacketKind::Ping), 0, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Action::Drop)
        });
        dispatcher.register("high", Matcher::kind(PacketKind::Ping), 10, |_, _| {
            Ok(Action::Replace(Packet::new(
                PacketKind::Ping,
                b"pong".to_vec(),
            )))
        });

        let action = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(
            action,
            Action::Replace(Packet::new(PacketKind::Ping, b"pong".to_vec()))
        );
        // The lower-priority hook was never invoked for this packet
        assert_eq!(low_invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let mut dispatcher = HookDispatcher::new();

        dispatcher.register("first", Matcher::any(), 5, |_, _| Ok(Action::Drop));
        dispatcher.register("second", Matcher::any(), 5, |_, _| {
            Ok(Action::Replace(Packet::new(PacketKind::Text, vec![])))
        });

        let action = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(action, Action::Drop);
    }

    #[test]
    fn test_pass_through_continues_to_next_hook() {
        let mut dispatcher = HookDispatcher::new();

        dispatcher.register("observer", Matcher::any(), 10, |_, _| Ok(Action::Forward));
        dispatcher.register("dropper", Matcher::any(), 0, |_, _| Ok(Action::Drop));

        let action = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(action, Action::Drop);
    }

    #[test]
    fn test_matcher_filters_kind_and_direction() {
        let mut dispatcher = HookDispatcher::new();
        dispatcher.register(
            "server_only",
            Matcher::kind(PacketKind::Ping).direction(Direction::ServerToClient),
            0,
            |_, _| Ok(Action::Drop),
        );

        let forward = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(forward, Action::Forward);

        let dropped = dispatcher.dispatch(&ping(), &ctx(Direction::ServerToClient));
        assert_eq!(dropped, Action::Drop);
    }

    #[test]
    fn test_hook_error_is_isolated() {
        let mut dispatcher = HookDispatcher::new();

        dispatcher.register("faulty", Matcher::any(), 10, |_, _| {
            Err(ProxyError::Hook("boom".into()))
        });
        dispatcher.register("dropper", Matcher::any(), 0, |_, _| Ok(Action::Drop));

        // The faulty hook is treated as pass-through; dispatch continues
        let action = dispatcher.dispatch(&ping(), &ctx(Direction::ClientToServer));
        assert_eq!(action, Action::Drop);
    }
}
