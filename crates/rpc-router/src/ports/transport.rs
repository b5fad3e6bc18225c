//! # Transport Port
//!
//! The contract every signaling strategy implements. The router owns one
//! instance per strategy it initialized and picks among them per endpoint.
//!
//! ## Contract
//!
//! - `init` registers the transport's listener on the local context and
//!   keeps the hooks. Returning false makes the router fall back to noop.
//! - `setup` prepares the channel to one target. False means "not yet" and
//!   schedules a retry.
//! - `send` delivers one envelope. False means the channel is unusable and
//!   degrades the endpoint to noop for good.
//!
//! Transports that establish connections themselves report the outcome
//! through `on_ready` exactly once per endpoint, always from the local
//! context's event loop, never from inside `setup` or `send`.

use rpc_types::Envelope;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Closed set of transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransportCode {
    /// Structured message channel.
    PostMessage,
    /// Shared bridge object.
    Bridge,
    /// Resize-driven relay side channel.
    ResizeRelay,
    /// Frame-element function slots.
    FrameElement,
    /// Relay navigation with an address fragment.
    Fragment,
    /// Logging sentinel.
    Noop,
}

impl TransportCode {
    /// Short wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransportCode::PostMessage => "wpm",
            TransportCode::Bridge => "nix",
            TransportCode::ResizeRelay => "rmr",
            TransportCode::FrameElement => "fe",
            TransportCode::Fragment => "ifpc",
            TransportCode::Noop => "noop",
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivers a decoded inbound envelope to the router.
pub type MessageHook = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Reports that the channel to a peer is usable (or never will be).
pub type ReadyHook = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Looks up the relay address recorded for a target.
pub type RelayUrlHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Router callbacks handed to a transport at `init`.
#[derive(Clone)]
pub struct TransportHooks {
    pub on_message: MessageHook,
    pub on_ready: ReadyHook,
    pub relay_url: RelayUrlHook,
}

impl fmt::Debug for TransportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHooks").finish_non_exhaustive()
    }
}

/// One signaling strategy.
pub trait Transport: Send + Sync {
    /// Which strategy this is.
    fn code(&self) -> TransportCode;

    /// Whether the sender can be sure only the intended receiver, as named
    /// by its relay address, gets the message.
    fn is_relay_verifiable(&self) -> bool;

    /// Attach to the local context.
    fn init(&self, hooks: TransportHooks) -> bool;

    /// Prepare the channel to `target` using the shared `token`.
    fn setup(&self, target: &str, token: &str) -> bool;

    /// Deliver `envelope` to `target`; `from` is the local id as the target
    /// knows it.
    fn send(&self, target: &str, from: &str, envelope: &Envelope) -> bool;

    /// Detach from the local context.
    fn shutdown(&self) {}
}
