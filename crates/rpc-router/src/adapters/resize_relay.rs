//! # `rmr`: Resize Relay
//!
//! Each context hosts one relay resource per peer. A sender rewrites the
//! receiver's resource with a [`RelayBatch`] and resizes it; the receiver
//! reads the batch when it sees the resize signal. A periodic poll re-queues
//! the signal for resources that changed without one, so batches are only
//! ever read on the context's event loop.
//!
//! ## Batching
//!
//! - Every batch carries all of the writer's unacknowledged packets plus the
//!   highest peer sequence number it has processed, so the latest contents
//!   always supersede earlier ones.
//! - A send rewrites the peer's resource only when no earlier batch is
//!   awaiting acknowledgement; otherwise the packet waits in the outbound
//!   queue and rides along with the next write.
//! - A reader answers every batch that carried new packets, and the first
//!   batch from any peer. The first batch also reports `on_ready(peer)`.

use crate::adapters::Attachment;
use crate::domain::ScheduledTask;
use crate::ports::{Transport, TransportCode, TransportHooks};
use parking_lot::Mutex;
use rpc_host::{Signal, Window};
use rpc_types::{decode_json, encode_json, Envelope, RelayBatch, RelayPacket};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct PeerState {
    next_seq: u64,
    outbound: VecDeque<RelayPacket>,
    waiting: bool,
    last_seen: u64,
    last_version: u64,
    seen_batch: bool,
}

struct Inner {
    window: Arc<Window>,
    attachment: Attachment,
    peers: Mutex<HashMap<String, PeerState>>,
}

impl Inner {
    /// Rewrite `peer`'s relay resource with our ack and pending packets.
    fn write_batch(&self, peer: &str, state: &PeerState) -> bool {
        let Some(window) = self.window.resolve(peer) else {
            return false;
        };
        if !window.capabilities().resize_relay {
            return false;
        }
        let batch = RelayBatch {
            ack: state.last_seen,
            packets: state.outbound.iter().cloned().collect(),
        };
        let contents = match batch.encode() {
            Ok(contents) => contents,
            Err(e) => {
                debug!(peer, error = %e, "rmr: encode failed");
                return false;
            }
        };
        let key = self.window.id_seen_by(peer);
        window.relay_resource(&key).write(contents);
        window.dispatch(Signal::RelayResized { peer: key })
    }

    /// Process the current contents of the resource `peer` writes into.
    /// Runs on the context's event loop only.
    fn read_relay(&self, peer: &str) {
        let (version, contents) = self.window.relay_resource(peer).read();
        let mut peers = self.peers.lock();
        let state = peers.entry(peer.to_string()).or_default();
        if version <= state.last_version {
            return;
        }
        state.last_version = version;

        let batch = match RelayBatch::decode(&contents) {
            Ok(batch) => batch,
            Err(e) => {
                debug!(peer, error = %e, "rmr: dropping undecodable batch");
                return;
            }
        };

        state.outbound.retain(|packet| packet.seq > batch.ack);
        state.waiting = false;

        let mut arrived = Vec::new();
        let mut advanced = false;
        for packet in batch.packets {
            if packet.seq <= state.last_seen {
                continue;
            }
            state.last_seen = packet.seq;
            advanced = true;
            match decode_json(&packet.data) {
                Ok(envelope) => arrived.push(envelope),
                Err(e) => debug!(peer, seq = packet.seq, error = %e, "rmr: dropping packet"),
            }
        }
        let first = !state.seen_batch;
        state.seen_batch = true;

        if first || advanced || !state.outbound.is_empty() {
            let wrote = self.write_batch(peer, state);
            state.waiting = wrote && !state.outbound.is_empty();
        }
        drop(peers);

        let Some(hooks) = self.attachment.hooks() else {
            return;
        };
        if first {
            (hooks.on_ready)(peer, true);
        }
        for envelope in arrived {
            (hooks.on_message)(envelope);
        }
    }

    /// Re-signal resources whose contents changed without a resize
    /// reaching the event loop.
    fn poll(&self) {
        for (peer, relay) in self.window.relay_resources() {
            let stale = self
                .peers
                .lock()
                .get(&peer)
                .map_or(0, |state| state.last_version);
            if relay.version() > stale {
                self.window.dispatch(Signal::RelayResized { peer });
            }
        }
    }
}

pub struct ResizeRelayTransport {
    inner: Arc<Inner>,
    poll_interval: Duration,
    poller: Mutex<Option<ScheduledTask>>,
}

impl ResizeRelayTransport {
    #[must_use]
    pub fn new(window: Arc<Window>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                attachment: Attachment::default(),
                peers: Mutex::new(HashMap::new()),
            }),
            poll_interval,
            poller: Mutex::new(None),
        }
    }

    /// Packets sent to `peer` that have not been acknowledged yet.
    #[must_use]
    pub fn unacknowledged(&self, peer: &str) -> usize {
        self.inner
            .peers
            .lock()
            .get(peer)
            .map_or(0, |state| state.outbound.len())
    }
}

impl Transport for ResizeRelayTransport {
    fn code(&self) -> TransportCode {
        TransportCode::ResizeRelay
    }

    fn is_relay_verifiable(&self) -> bool {
        true
    }

    fn init(&self, hooks: TransportHooks) -> bool {
        if !self.inner.window.capabilities().resize_relay {
            return false;
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.attachment.attach(
            &self.inner.window,
            hooks,
            Arc::new(move |signal: &Signal| {
                if let (Signal::RelayResized { peer }, Some(inner)) = (signal, weak.upgrade()) {
                    inner.read_relay(peer);
                }
            }),
        );

        let weak = Arc::downgrade(&self.inner);
        let poller = ScheduledTask::every(self.poll_interval, move || match weak.upgrade() {
            Some(inner) => {
                inner.poll();
                true
            }
            None => false,
        });
        if poller.is_none() {
            debug!("rmr: no runtime, relay polling disabled");
        }
        *self.poller.lock() = poller;
        true
    }

    fn setup(&self, target: &str, _token: &str) -> bool {
        let mut peers = self.inner.peers.lock();
        let state = peers.entry(target.to_string()).or_default();
        self.inner.write_batch(target, state)
    }

    fn send(&self, target: &str, _from: &str, envelope: &Envelope) -> bool {
        let data = match encode_json(envelope) {
            Ok(data) => data,
            Err(e) => {
                debug!(target, error = %e, "rmr: encode failed");
                return false;
            }
        };
        let Some(peer) = self.inner.window.resolve(target) else {
            return false;
        };
        if !peer.capabilities().resize_relay {
            return false;
        }

        let mut peers = self.inner.peers.lock();
        let state = peers.entry(target.to_string()).or_default();
        state.next_seq += 1;
        let seq = state.next_seq;
        state.outbound.push_back(RelayPacket { seq, data });
        if state.waiting {
            debug!(target, seq, "rmr: queued behind unacknowledged batch");
            return true;
        }
        let wrote = self.inner.write_batch(target, state);
        state.waiting = wrote;
        wrote
    }

    fn shutdown(&self) {
        self.poller.lock().take();
        self.inner.attachment.detach(&self.inner.window);
    }
}
