//! `nix`: a bridge object exposed by the child.
//!
//! The child exposes a bridge guarded by its auth token. The container
//! connects during setup by presenting the same token; both sides learn the
//! outcome through a `BridgeConnected` signal on their own event loop, which
//! becomes `on_ready`. Not relay-verifiable: whoever holds the bridge can
//! talk through it.

use crate::adapters::{deliver_json, Attachment};
use crate::ports::{Transport, TransportCode, TransportHooks};
use parking_lot::Mutex;
use rpc_host::{Signal, Window};
use rpc_types::{encode_json, Envelope, PARENT_ID};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BridgeTransport {
    window: Arc<Window>,
    attachment: Attachment,
    reported: Mutex<HashSet<String>>,
}

impl BridgeTransport {
    #[must_use]
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            attachment: Attachment::default(),
            reported: Mutex::new(HashSet::new()),
        }
    }

    fn setup_parent(&self, token: &str) -> bool {
        self.window.expose_bridge(token).is_connected()
    }

    fn setup_child(&self, target: &str, token: &str) -> bool {
        if self.reported.lock().contains(target) {
            return true;
        }
        let Some(child) = self.window.child(target) else {
            return false;
        };
        let Some(bridge) = child.bridge() else {
            debug!(target, "nix: child has not exposed a bridge yet");
            return false;
        };

        let success = bridge.connect(token);
        if success {
            child.dispatch(Signal::BridgeConnected {
                peer: PARENT_ID.to_string(),
                success: true,
            });
        } else {
            warn!(target, "nix: bridge refused the auth token");
        }
        self.reported.lock().insert(target.to_string());
        self.window.dispatch(Signal::BridgeConnected {
            peer: target.to_string(),
            success,
        });
        true
    }
}

impl Transport for BridgeTransport {
    fn code(&self) -> TransportCode {
        TransportCode::Bridge
    }

    fn is_relay_verifiable(&self) -> bool {
        false
    }

    fn init(&self, hooks: TransportHooks) -> bool {
        if !self.window.capabilities().bridge {
            return false;
        }
        let inbound = hooks.clone();
        self.attachment.attach(
            &self.window,
            hooks,
            Arc::new(move |signal: &Signal| match signal {
                Signal::BridgeMessage { data } => {
                    deliver_json(TransportCode::Bridge, &inbound, data);
                }
                Signal::BridgeConnected { peer, success } => {
                    (inbound.on_ready)(peer, *success);
                }
                _ => {}
            }),
        );
        true
    }

    fn setup(&self, target: &str, token: &str) -> bool {
        if target == PARENT_ID {
            self.setup_parent(token)
        } else {
            self.setup_child(target, token)
        }
    }

    fn send(&self, target: &str, _from: &str, envelope: &Envelope) -> bool {
        let (peer, bridge) = if target == PARENT_ID {
            (self.window.parent(), self.window.bridge())
        } else {
            let child = self.window.child(target);
            let bridge = child.as_ref().and_then(|c| c.bridge());
            (child, bridge)
        };
        let (Some(peer), Some(bridge)) = (peer, bridge) else {
            return false;
        };
        if !bridge.is_connected() {
            debug!(target, "nix: bridge not connected");
            return false;
        }
        match encode_json(envelope) {
            Ok(data) => peer.dispatch(Signal::BridgeMessage { data }),
            Err(e) => {
                debug!(target, error = %e, "nix: encode failed");
                false
            }
        }
    }

    fn shutdown(&self) {
        self.attachment.detach(&self.window);
    }
}
