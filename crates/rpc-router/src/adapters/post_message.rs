//! `wpm`: the structured cross-context message channel.
//!
//! Payloads are posted with the target origin derived from the target's
//! relay address, so a context that navigated elsewhere never sees them.

use crate::adapters::{deliver_json, Attachment};
use crate::ports::{Transport, TransportCode, TransportHooks};
use rpc_host::{Signal, Window};
use rpc_types::{encode_json, origin_of, Envelope};
use std::sync::Arc;
use tracing::debug;

pub struct PostMessageTransport {
    window: Arc<Window>,
    attachment: Attachment,
}

impl PostMessageTransport {
    #[must_use]
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            attachment: Attachment::default(),
        }
    }
}

impl Transport for PostMessageTransport {
    fn code(&self) -> TransportCode {
        TransportCode::PostMessage
    }

    fn is_relay_verifiable(&self) -> bool {
        true
    }

    fn init(&self, hooks: TransportHooks) -> bool {
        if !self.window.capabilities().post_message {
            return false;
        }
        let inbound = hooks.clone();
        self.attachment.attach(
            &self.window,
            hooks,
            Arc::new(move |signal: &Signal| {
                if let Signal::Message { data, .. } = signal {
                    deliver_json(TransportCode::PostMessage, &inbound, data);
                }
            }),
        );
        true
    }

    fn setup(&self, _target: &str, _token: &str) -> bool {
        true
    }

    fn send(&self, target: &str, _from: &str, envelope: &Envelope) -> bool {
        let Some(peer) = self.window.resolve(target) else {
            debug!(target, "wpm: no such context");
            return false;
        };
        if !peer.capabilities().post_message {
            return false;
        }
        let Some(relay) = self.attachment.relay_url(target) else {
            debug!(target, "wpm: no relay address to derive the target origin");
            return false;
        };
        let data = match encode_json(envelope) {
            Ok(data) => data,
            Err(e) => {
                debug!(target, error = %e, "wpm: encode failed");
                return false;
            }
        };
        let target_origin = origin_of(&relay, self.window.scheme());
        if !peer.post_message(data, &target_origin, &self.window.origin()) {
            debug!(target, %target_origin, "wpm: message not accepted by target");
        }
        true
    }

    fn shutdown(&self) {
        self.attachment.detach(&self.window);
    }
}
