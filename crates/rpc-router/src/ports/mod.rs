//! Ports layer for the router.
//!
//! - `transport`: the driven port every signaling strategy implements
//! - `handler`: the driving port application services implement

pub mod handler;
pub mod transport;

pub use handler::{CallContext, Callback, Responder, ServiceHandler};
pub use transport::{
    MessageHook, ReadyHook, RelayUrlHook, Transport, TransportCode, TransportHooks,
};
