//! `ifpc`: payloads carried in the fragment of a navigated relay address.
//!
//! Always available. The relay page lives on the receiver's origin, so only
//! the context named by the relay address receives the message. Messages
//! larger than the fragment limit are split and reassembled by the
//! receiver.

use crate::adapters::Attachment;
use crate::ports::{Transport, TransportCode, TransportHooks};
use parking_lot::Mutex;
use rpc_host::{Signal, Window};
use rpc_types::{decode_fragment, encode_fragments, Envelope, FragmentAssembler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub struct FragmentTransport {
    window: Arc<Window>,
    attachment: Attachment,
    max_chunk: usize,
    message_id: AtomicU64,
}

impl FragmentTransport {
    #[must_use]
    pub fn new(window: Arc<Window>, max_chunk: usize) -> Self {
        Self {
            window,
            attachment: Attachment::default(),
            max_chunk,
            message_id: AtomicU64::new(0),
        }
    }
}

impl Transport for FragmentTransport {
    fn code(&self) -> TransportCode {
        TransportCode::Fragment
    }

    fn is_relay_verifiable(&self) -> bool {
        true
    }

    fn init(&self, hooks: TransportHooks) -> bool {
        let inbound = hooks.clone();
        let assembler = Mutex::new(FragmentAssembler::new());
        self.attachment.attach(
            &self.window,
            hooks,
            Arc::new(move |signal: &Signal| {
                let Signal::FragmentNavigated { fragment } = signal else {
                    return;
                };
                let assembled = decode_fragment(fragment)
                    .and_then(|packet| assembler.lock().accept(packet));
                match assembled {
                    Ok(Some(envelope)) => (inbound.on_message)(envelope),
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "ifpc: dropping undecodable fragment"),
                }
            }),
        );
        true
    }

    fn setup(&self, _target: &str, _token: &str) -> bool {
        true
    }

    fn send(&self, target: &str, from: &str, envelope: &Envelope) -> bool {
        let Some(relay) = self.attachment.relay_url(target) else {
            debug!(target, "ifpc: no relay address");
            return false;
        };
        let Some(peer) = self.window.resolve(target) else {
            debug!(target, "ifpc: no such context");
            return false;
        };
        let message_id = self.message_id.fetch_add(1, Ordering::Relaxed) + 1;
        let fragments = match encode_fragments(target, from, message_id, envelope, self.max_chunk) {
            Ok(fragments) => fragments,
            Err(e) => {
                debug!(target, error = %e, "ifpc: encode failed");
                return false;
            }
        };
        let address = relay.split('#').next().unwrap_or_default();
        for fragment in fragments {
            if !peer.navigate_relay(&format!("{address}#{fragment}")) {
                debug!(target, relay = %address, "ifpc: relay did not reach the target");
            }
        }
        true
    }

    fn shutdown(&self) {
        self.attachment.detach(&self.window);
    }
}
