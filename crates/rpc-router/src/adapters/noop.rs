//! `noop`: the logging sentinel endpoints degrade to.

use crate::ports::{Transport, TransportCode, TransportHooks};
use rpc_types::Envelope;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn code(&self) -> TransportCode {
        TransportCode::Noop
    }

    fn is_relay_verifiable(&self) -> bool {
        true
    }

    fn init(&self, _hooks: TransportHooks) -> bool {
        true
    }

    fn setup(&self, _target: &str, _token: &str) -> bool {
        true
    }

    fn send(&self, target: &str, _from: &str, envelope: &Envelope) -> bool {
        info!(
            target,
            service = envelope.service(),
            transport = %TransportCode::Noop,
            "No usable channel, message dropped"
        );
        true
    }
}
