//! # Endpoint
//!
//! Everything a router knows about one peer context: where to reach it,
//! how to authenticate to it, which transport carries its traffic, and how
//! far the handshake has come.
//!
//! ## Invariants
//!
//! - Exactly one assigned transport at a time. Once `noop` is assigned it
//!   is never replaced.
//! - The early queue is drained at most once, when `confirmed` first turns
//!   true.

use crate::domain::early_queue::EarlyQueue;
use crate::domain::handshake::SetupState;
use crate::domain::same_domain::SameDomainProbe;
use crate::domain::scheduler::ScheduledTask;
use crate::ports::TransportCode;
use serde::Serialize;

/// Mutable per-peer record owned by the router state.
#[derive(Debug, Default)]
pub struct Endpoint {
    pub relay_url: Option<String>,
    pub auth_token: Option<String>,
    pub legacy: bool,
    pub transport: Option<TransportCode>,
    pub setup: SetupState,
    pub confirmed: bool,
    pub queue: EarlyQueue,
    pub same_domain: SameDomainProbe,
    pub retry: Option<ScheduledTask>,
}

impl Endpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `code` unless the endpoint already degraded to noop.
    /// Returns whether the assignment changed.
    pub fn assign_transport(&mut self, code: TransportCode) -> bool {
        if self.transport == Some(TransportCode::Noop) || self.transport == Some(code) {
            return false;
        }
        self.transport = Some(code);
        true
    }

    /// Whether traffic is permanently routed to the noop transport.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.transport == Some(TransportCode::Noop)
    }

    /// Token recorded for inbound validation, ignoring the empty token.
    #[must_use]
    pub fn expected_token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Read-only view for callers.
    #[must_use]
    pub fn status(&self, target: &str) -> EndpointStatus {
        EndpointStatus {
            target: target.to_string(),
            relay_url: self.relay_url.clone(),
            has_auth_token: self.auth_token.is_some(),
            legacy: self.legacy,
            transport: self.transport,
            setup: self.setup,
            confirmed: self.confirmed,
            queued: self.queue.len(),
            same_domain: self.same_domain,
        }
    }
}

/// Snapshot of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub target: String,
    pub relay_url: Option<String>,
    pub has_auth_token: bool,
    pub legacy: bool,
    pub transport: Option<TransportCode>,
    pub setup: SetupState,
    pub confirmed: bool,
    pub queued: usize,
    pub same_domain: SameDomainProbe,
}
