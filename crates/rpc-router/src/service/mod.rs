//! Service layer: the router that wires the domain state to the transports
//! and to application handlers.

pub mod router;

pub use router::Router;
