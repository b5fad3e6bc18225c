//! # Capability Probe
//!
//! Chooses the default transport once per context, most capable first:
//!
//! ```text
//! post_message ──► wpm
//! bridge ────────► nix
//! resize_relay ──► rmr
//! frame_element ─► fe
//! otherwise ─────► ifpc
//! ```
//!
//! A gadget configured for the legacy protocol always uses `ifpc`. The
//! fragment and noop transports are kept alongside the default: legacy
//! endpoints always travel over `ifpc`, and degraded endpoints over `noop`.

use crate::adapters::{
    BridgeTransport, FragmentTransport, FrameElementTransport, NoopTransport,
    PostMessageTransport, ResizeRelayTransport,
};
use crate::config::RpcConfig;
use crate::ports::{Transport, TransportCode, TransportHooks};
use parking_lot::RwLock;
use rpc_host::{Capabilities, Window};
use rpc_types::TransportFault;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Default transport for a context with `capabilities`.
#[must_use]
pub fn probe_default(capabilities: Capabilities, legacy: bool) -> TransportCode {
    if legacy {
        TransportCode::Fragment
    } else if capabilities.post_message {
        TransportCode::PostMessage
    } else if capabilities.bridge {
        TransportCode::Bridge
    } else if capabilities.resize_relay {
        TransportCode::ResizeRelay
    } else if capabilities.frame_element {
        TransportCode::FrameElement
    } else {
        TransportCode::Fragment
    }
}

/// The transports a router owns, plus its current default.
pub struct TransportSet {
    default: RwLock<TransportCode>,
    instances: HashMap<TransportCode, Arc<dyn Transport>>,
}

impl TransportSet {
    /// Instantiate the probed default plus the fragment and noop transports.
    #[must_use]
    pub fn select(window: &Arc<Window>, config: &RpcConfig, legacy: bool) -> Self {
        let default = probe_default(window.capabilities(), legacy);
        let mut instances: HashMap<TransportCode, Arc<dyn Transport>> = HashMap::new();

        let chosen: Option<Arc<dyn Transport>> = match default {
            TransportCode::PostMessage => {
                Some(Arc::new(PostMessageTransport::new(Arc::clone(window))))
            }
            TransportCode::Bridge => Some(Arc::new(BridgeTransport::new(Arc::clone(window)))),
            TransportCode::ResizeRelay => Some(Arc::new(ResizeRelayTransport::new(
                Arc::clone(window),
                config.relay_poll_interval(),
            ))),
            TransportCode::FrameElement => {
                Some(Arc::new(FrameElementTransport::new(Arc::clone(window))))
            }
            TransportCode::Fragment | TransportCode::Noop => None,
        };
        if let Some(transport) = chosen {
            instances.insert(default, transport);
        }
        instances.insert(
            TransportCode::Fragment,
            Arc::new(FragmentTransport::new(
                Arc::clone(window),
                config.fragment_max_len,
            )),
        );
        instances.insert(TransportCode::Noop, Arc::new(NoopTransport));

        Self {
            default: RwLock::new(default),
            instances,
        }
    }

    /// Initialize every owned transport. A default that fails to initialize
    /// is replaced by noop.
    pub fn init(&self, window: &Window, hooks: &TransportHooks) {
        let default = self.default_code();
        for (code, transport) in &self.instances {
            if transport.init(hooks.clone()) {
                continue;
            }
            let fault = TransportFault::InitFailed {
                transport: code.to_string(),
            };
            warn!(window = %window.name(), error = %fault, "Transport unavailable");
            if *code == default {
                *self.default.write() = TransportCode::Noop;
            }
        }
        info!(window = %window.name(), transport = %self.default_code(), "Default transport selected");
    }

    #[must_use]
    pub fn default_code(&self) -> TransportCode {
        *self.default.read()
    }

    /// Transport for `code`, falling back to the default and then noop.
    #[must_use]
    pub fn get(&self, code: TransportCode) -> Arc<dyn Transport> {
        self.instances
            .get(&code)
            .or_else(|| self.instances.get(&self.default_code()))
            .or_else(|| self.instances.get(&TransportCode::Noop))
            .map_or_else(|| Arc::new(NoopTransport) as Arc<dyn Transport>, Arc::clone)
    }

    #[must_use]
    pub fn default_transport(&self) -> Arc<dyn Transport> {
        self.get(self.default_code())
    }

    /// Replace a default that cannot verify its receiver with `ifpc`.
    /// Returns whether the default changed.
    pub fn force_verifiable(&self) -> bool {
        let mut default = self.default.write();
        let verifiable = self
            .instances
            .get(&default)
            .is_some_and(|transport| transport.is_relay_verifiable());
        if verifiable {
            return false;
        }
        *default = TransportCode::Fragment;
        true
    }

    pub fn shutdown(&self) {
        for transport in self.instances.values() {
            transport.shutdown();
        }
    }
}
