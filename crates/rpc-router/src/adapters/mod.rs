//! # Transport Adapters
//!
//! One adapter per signaling strategy, each built on the primitives the
//! host context exposes:
//!
//! | Code   | Adapter                 | Carrier                          | Relay-verifiable |
//! |--------|-------------------------|----------------------------------|------------------|
//! | `wpm`  | [`PostMessageTransport`]  | origin-checked message channel | yes |
//! | `nix`  | [`BridgeTransport`]       | token-guarded bridge object    | no  |
//! | `rmr`  | [`ResizeRelayTransport`]  | relay resource + resize signal | yes |
//! | `fe`   | [`FrameElementTransport`] | frame-element function slots   | no  |
//! | `ifpc` | [`FragmentTransport`]     | relay navigation fragment      | yes |
//! | `noop` | [`NoopTransport`]         | log line                       | yes |
//!
//! [`probe`] picks the default for a context from its capabilities.

pub mod bridge;
pub mod fragment;
pub mod frame_element;
pub mod noop;
pub mod post_message;
pub mod probe;
pub mod resize_relay;

pub use bridge::BridgeTransport;
pub use fragment::FragmentTransport;
pub use frame_element::FrameElementTransport;
pub use noop::NoopTransport;
pub use post_message::PostMessageTransport;
pub use probe::{probe_default, TransportSet};
pub use resize_relay::ResizeRelayTransport;

use crate::ports::{TransportCode, TransportHooks};
use parking_lot::{Mutex, RwLock};
use rpc_host::{Listener, ListenerId, Window};
use rpc_types::decode_json;
use tracing::debug;

/// Hooks and listener registration shared by the adapters.
#[derive(Default)]
pub(crate) struct Attachment {
    hooks: RwLock<Option<TransportHooks>>,
    listener: Mutex<Option<ListenerId>>,
}

impl Attachment {
    /// Keep `hooks` and register `listener` on `window`, replacing any
    /// earlier registration.
    pub(crate) fn attach(&self, window: &Window, hooks: TransportHooks, listener: Listener) {
        *self.hooks.write() = Some(hooks);
        let id = window.add_listener(listener);
        if let Some(previous) = self.listener.lock().replace(id) {
            window.remove_listener(previous);
        }
    }

    pub(crate) fn detach(&self, window: &Window) {
        if let Some(id) = self.listener.lock().take() {
            window.remove_listener(id);
        }
        *self.hooks.write() = None;
    }

    pub(crate) fn hooks(&self) -> Option<TransportHooks> {
        self.hooks.read().clone()
    }

    /// Relay address the router recorded for `target`.
    pub(crate) fn relay_url(&self, target: &str) -> Option<String> {
        let hooks = self.hooks()?;
        (hooks.relay_url)(target)
    }
}

/// Decode a serialized envelope and hand it to the router.
pub(crate) fn deliver_json(code: TransportCode, hooks: &TransportHooks, data: &str) {
    match decode_json(data) {
        Ok(envelope) => (hooks.on_message)(envelope),
        Err(e) => debug!(transport = %code, error = %e, "Dropping undecodable payload"),
    }
}
