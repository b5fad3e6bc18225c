//! `fe`: function slots on the child's embedding element.
//!
//! Each side installs its receive slot during setup and reports success
//! once the peer's slot is present too, so the first setup attempt on the
//! earlier side retries until the later side arrives.

use crate::adapters::{deliver_json, Attachment};
use crate::ports::{Transport, TransportCode, TransportHooks};
use rpc_host::{Signal, Window};
use rpc_types::{encode_json, Envelope, PARENT_ID};
use std::sync::Arc;
use tracing::debug;

pub struct FrameElementTransport {
    window: Arc<Window>,
    attachment: Attachment,
}

impl FrameElementTransport {
    #[must_use]
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            attachment: Attachment::default(),
        }
    }
}

impl Transport for FrameElementTransport {
    fn code(&self) -> TransportCode {
        TransportCode::FrameElement
    }

    fn is_relay_verifiable(&self) -> bool {
        false
    }

    fn init(&self, hooks: TransportHooks) -> bool {
        if !self.window.capabilities().frame_element {
            return false;
        }
        let inbound = hooks.clone();
        self.attachment.attach(
            &self.window,
            hooks,
            Arc::new(move |signal: &Signal| {
                if let Signal::FrameElementMessage { data } = signal {
                    deliver_json(TransportCode::FrameElement, &inbound, data);
                }
            }),
        );
        true
    }

    fn setup(&self, target: &str, _token: &str) -> bool {
        if target == PARENT_ID {
            let Some(element) = self.window.frame_element() else {
                return false;
            };
            element.install_c2g();
            element.has_g2c()
        } else {
            let Some(child) = self.window.child(target) else {
                return false;
            };
            if !child.capabilities().frame_element {
                return false;
            }
            let Some(element) = child.frame_element() else {
                return false;
            };
            element.install_g2c();
            element.has_c2g()
        }
    }

    fn send(&self, target: &str, _from: &str, envelope: &Envelope) -> bool {
        let (peer, slot_ready) = if target == PARENT_ID {
            let ready = self
                .window
                .frame_element()
                .is_some_and(|element| element.has_g2c());
            (self.window.parent(), ready)
        } else {
            let child = self.window.child(target);
            let ready = child
                .as_ref()
                .and_then(|c| c.frame_element())
                .is_some_and(|element| element.has_c2g());
            (child, ready)
        };
        let Some(peer) = peer else {
            return false;
        };
        if !slot_ready {
            debug!(target, "fe: receive slot not installed");
            return false;
        }
        match encode_json(envelope) {
            Ok(data) => peer.dispatch(Signal::FrameElementMessage { data }),
            Err(e) => {
                debug!(target, error = %e, "fe: encode failed");
                false
            }
        }
    }

    fn shutdown(&self) {
        self.attachment.detach(&self.window);
    }
}
