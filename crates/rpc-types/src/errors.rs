//! # Error Types
//!
//! The fault taxonomy shared by the router and its transports.
//!
//! | Fault | Raised by | Surfaced to |
//! |-------|-----------|-------------|
//! | `ConfigurationFault` | registration calls | the caller |
//! | `AuthFault` | `process()` | `process()` caller; logged at transport boundary |
//! | `TransportFault` | failed `send()`/`setup()` | logs and metrics only |
//! | `CodecError` | inbound decoding | logs only |
//!
//! PeerSilence (no response for a pending callback) is not an error: it is
//! never detected.

use thiserror::Error;

/// Top-level error returned by router operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Misuse of the registration API.
    #[error("Configuration fault: {0}")]
    Configuration(#[from] ConfigurationFault),

    /// Inbound envelope carried the wrong token for its sender.
    #[error("Auth fault: {0}")]
    Auth(#[from] AuthFault),

    /// A transport could not deliver or set up.
    #[error("Transport fault: {0}")]
    Transport(#[from] TransportFault),

    /// Inbound bytes could not be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl RpcError {
    /// Returns true for auth mismatches.
    #[must_use]
    pub fn is_auth_fault(&self) -> bool {
        matches!(self, RpcError::Auth(_))
    }
}

/// Errors rejected at registration time rather than swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationFault {
    /// Attempt to bind or unbind `__cb`, `__ack` or the default slot.
    #[error("Cannot overwrite reserved service {name:?}")]
    ReservedService { name: String },

    /// The target has no relay address and none could be derived.
    #[error("No relay address available for target {target:?}")]
    MissingRelayAddress { target: String },

    /// The target context is not present in the child registry.
    #[error("Cannot set up receiver with id {target:?}: context not found")]
    UnknownTarget { target: String },

    /// Relay address or token rewritten after setup completed.
    #[error("Endpoint {target:?} is already set up")]
    EndpointSealed { target: String },

    /// Configuration values out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Token mismatch between an envelope and the record for its sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid auth token from sender {sender:?} (token present: {token_present})")]
pub struct AuthFault {
    /// Claimed sender id.
    pub sender: String,
    /// Whether the envelope carried any token at all.
    pub token_present: bool,
}

/// Delivery or setup failure. Always recovered by fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    /// `send()` returned false.
    #[error("Transport {transport} rejected send to {target:?}")]
    SendRejected { transport: String, target: String },

    /// `setup()` never succeeded within the retry budget.
    #[error("Setup for {target:?} exhausted after {attempts} attempts")]
    SetupExhausted { target: String, attempts: u32 },

    /// `init()` returned false.
    #[error("Transport {transport} failed to initialize")]
    InitFailed { transport: String },
}

/// Errors decoding inbound payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// JSON is well formed but not envelope-shaped.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Address fragment could not be parsed.
    #[error("Malformed fragment: {0}")]
    MalformedFragment(String),

    /// Fragment message declares more chunks than a receiver will hold.
    #[error("Fragment message declares {0} chunks")]
    TooManyChunks(usize),

    /// Relay batch could not be parsed.
    #[error("Malformed relay batch: {0}")]
    MalformedBatch(String),
}
