//! # Early-Message Queue
//!
//! Calls made before an endpoint is confirmed are parked here, then replayed
//! once in call order with the auth token known at replay time. A drained
//! queue is sealed and rejects further pushes.

use rpc_types::Envelope;
use std::collections::VecDeque;

/// Per-endpoint buffer of envelopes awaiting confirmation.
#[derive(Debug, Default)]
pub struct EarlyQueue {
    items: VecDeque<Envelope>,
    sealed: bool,
}

impl EarlyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope. Hands it back if the queue is sealed.
    pub fn push(&mut self, envelope: Envelope) -> Result<(), Envelope> {
        if self.sealed {
            return Err(envelope);
        }
        self.items.push_back(envelope);
        Ok(())
    }

    /// Take every envelope in insertion order, re-stamped with `token`, and
    /// seal the queue. A second drain returns nothing.
    pub fn drain(&mut self, token: Option<&str>) -> Vec<Envelope> {
        self.sealed = true;
        self.items
            .drain(..)
            .map(|envelope| envelope.restamped(token.map(str::to_string)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
