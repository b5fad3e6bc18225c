//! # Call Registry
//!
//! Maps callback ids to the continuation waiting for a `__cb` response.
//!
//! Ids come from a counter that advances on every call, with or without a
//! callback, so an id is never reused while its entry exists. An entry is
//! removed by the first response carrying its id, by TTL eviction when
//! enabled, or when the router shuts down.

use crate::ports::Callback;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

struct PendingCallback {
    callback: Callback,
    target: String,
    service: String,
    created_at: Instant,
}

/// Pending callbacks for one router.
#[derive(Default)]
pub struct CallRegistry {
    last_id: u64,
    pending: HashMap<u64, PendingCallback>,
}

impl std::fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRegistry")
            .field("last_id", &self.last_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter and return the new id.
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Store the continuation for `id`.
    pub fn register(&mut self, id: u64, target: &str, service: &str, callback: Callback) {
        self.pending.insert(
            id,
            PendingCallback {
                callback,
                target: target.to_string(),
                service: service.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the continuation for `id`.
    pub fn take(&mut self, id: u64) -> Option<Callback> {
        self.pending.remove(&id).map(|pending| pending.callback)
    }

    /// Drop entries older than `ttl`. Returns how many were removed.
    pub fn remove_expired(&mut self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|id, pending| {
            let elapsed = now.duration_since(pending.created_at);
            if elapsed > ttl {
                warn!(
                    callback_id = id,
                    target = %pending.target,
                    service = %pending.service,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Evicting callback with no response"
                );
                false
            } else {
                true
            }
        });
        before - self.pending.len()
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }
}
