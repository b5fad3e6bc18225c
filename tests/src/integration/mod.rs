//! Cross-context integration flows.

pub mod handshake;
pub mod harness;
pub mod same_domain;
pub mod security;
pub mod transports;
