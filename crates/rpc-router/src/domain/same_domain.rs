//! Same-domain fast path probe.
//!
//! When the target's relay address shares the local origin, the target
//! context is reachable and has a router attached, envelopes skip
//! serialization and go straight into the peer's event queue. The outcome
//! is computed once per target and cached on the endpoint.

use rpc_host::Window;
use rpc_types::origin_of;
use serde::Serialize;

/// Cached result of the probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SameDomainProbe {
    #[default]
    Unknown,
    Unavailable,
    Available,
}

/// Decide whether `peer` can be reached directly from `local`.
#[must_use]
pub fn probe(local: &Window, relay_url: Option<&str>, peer: Option<&Window>) -> SameDomainProbe {
    let relay_origin = relay_url
        .map(|url| origin_of(url, local.scheme()))
        .unwrap_or_default();
    if relay_origin.is_empty() || relay_origin != local.origin() {
        return SameDomainProbe::Unavailable;
    }
    match peer {
        Some(peer) if local.can_access(peer) && peer.rpc_exposed() => SameDomainProbe::Available,
        _ => SameDomainProbe::Unavailable,
    }
}
