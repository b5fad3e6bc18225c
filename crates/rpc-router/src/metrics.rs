//! Router counters.
//!
//! Thread-safe atomics updated on the hot path and read as a
//! [`MetricsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one router.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// `call()` invocations.
    pub calls: AtomicU64,
    /// Envelopes parked in an early queue.
    pub queued: AtomicU64,
    /// Envelopes replayed from an early queue.
    pub drained: AtomicU64,
    /// Envelopes handed directly to a same-origin peer.
    pub same_domain_deliveries: AtomicU64,
    /// Successful transport sends.
    pub sends: AtomicU64,
    /// Sends that failed and degraded the endpoint to noop.
    pub fallbacks: AtomicU64,
    /// Inbound envelopes given to `process()`.
    pub processed: AtomicU64,
    /// Inbound envelopes rejected for a token mismatch.
    pub auth_faults: AtomicU64,
    /// Inbound envelopes for services with no handler.
    pub unknown_services: AtomicU64,
    /// Callbacks invoked by a `__cb` response.
    pub callbacks_fired: AtomicU64,
    /// `__cb` responses with no matching entry.
    pub callbacks_ignored: AtomicU64,
    /// Callbacks dropped by TTL eviction.
    pub callbacks_evicted: AtomicU64,
    /// Transport `setup()` attempts.
    pub setup_attempts: AtomicU64,
    /// Endpoints that ran out of setup attempts.
    pub setup_exhausted: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment one counter.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` to one counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            same_domain_deliveries: self.same_domain_deliveries.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            auth_faults: self.auth_faults.load(Ordering::Relaxed),
            unknown_services: self.unknown_services.load(Ordering::Relaxed),
            callbacks_fired: self.callbacks_fired.load(Ordering::Relaxed),
            callbacks_ignored: self.callbacks_ignored.load(Ordering::Relaxed),
            callbacks_evicted: self.callbacks_evicted.load(Ordering::Relaxed),
            setup_attempts: self.setup_attempts.load(Ordering::Relaxed),
            setup_exhausted: self.setup_exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RouterMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub queued: u64,
    pub drained: u64,
    pub same_domain_deliveries: u64,
    pub sends: u64,
    pub fallbacks: u64,
    pub processed: u64,
    pub auth_faults: u64,
    pub unknown_services: u64,
    pub callbacks_fired: u64,
    pub callbacks_ignored: u64,
    pub callbacks_evicted: u64,
    pub setup_attempts: u64,
    pub setup_exhausted: u64,
}
