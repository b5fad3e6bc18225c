//! # `Envelope`
//!
//! The single message unit exchanged between two endpoints.
//!
//! ## Wire Shape
//!
//! ```text
//! { s: service, f: senderId, c: callbackId (0 = none),
//!   a: [args...], t: authToken (omitted when absent), l: legacyFlag }
//! ```
//!
//! ## Properties
//!
//! - **Immutable**: fields are only readable once built. The early queue's
//!   token re-stamp consumes the envelope and returns a new one.
//! - **Single-use**: an envelope is created per call and dropped after one
//!   send attempt; nothing retains sent envelopes.
//! - **Sender authority**: `f` is the identity the receiver validates the
//!   auth token against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved target id naming the embedding (parent) context.
pub const PARENT_ID: &str = "..";

/// Reserved service carrying callback results back to the caller.
pub const CALLBACK_SERVICE: &str = "__cb";

/// Reserved service used by the handshake acknowledgement exchange.
pub const ACK_SERVICE: &str = "__ack";

/// Name under which the default (catch-all) handler is stored.
pub const DEFAULT_SERVICE: &str = "";

/// Callback id meaning "no response requested".
pub const NO_CALLBACK: u64 = 0;

/// Returns true if `name` may not be bound by `register`/`unregister`.
#[must_use]
pub fn is_reserved_service(name: &str) -> bool {
    name == CALLBACK_SERVICE || name == ACK_SERVICE || name == DEFAULT_SERVICE
}

/// The structured message exchanged between two endpoints.
///
/// Field names are the one-letter wire names so that the JSON form produced
/// by `serde_json` is byte-compatible with the peer's decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Service name.
    #[serde(rename = "s")]
    service: String,

    /// Sender id. `".."` when a container addresses a child.
    #[serde(rename = "f")]
    from: String,

    /// Callback id, 0 when no response is expected.
    #[serde(rename = "c", default)]
    callback_id: u64,

    /// Ordered argument list.
    #[serde(rename = "a")]
    args: Vec<Value>,

    /// Copy of the auth token recorded for the target.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,

    /// Legacy wire format requested by the target.
    #[serde(rename = "l", default)]
    legacy: bool,
}

impl Envelope {
    /// Start building an envelope for `service` sent by `from`.
    #[must_use]
    pub fn builder(service: impl Into<String>, from: impl Into<String>) -> EnvelopeBuilder {
        EnvelopeBuilder {
            service: service.into(),
            from: from.into(),
            callback_id: NO_CALLBACK,
            args: Vec::new(),
            auth_token: None,
            legacy: false,
        }
    }

    /// Service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Sender id.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Callback id (0 = none).
    #[must_use]
    pub fn callback_id(&self) -> u64 {
        self.callback_id
    }

    /// Whether the sender expects a correlated response.
    #[must_use]
    pub fn wants_callback(&self) -> bool {
        self.callback_id != NO_CALLBACK
    }

    /// Arguments in call order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Auth token copied from the sender's endpoint record.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Legacy wire format flag.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Returns true for the handshake acknowledgement service.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.service == ACK_SERVICE
    }

    /// Returns true for the callback-result service.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.service == CALLBACK_SERVICE
    }

    /// Replace the auth token, consuming the envelope.
    ///
    /// Used when replaying queued envelopes whose token was unknown at call
    /// time.
    #[must_use]
    pub fn restamped(mut self, auth_token: Option<String>) -> Self {
        self.auth_token = auth_token;
        self
    }
}

/// Fluent builder for [`Envelope`].
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    service: String,
    from: String,
    callback_id: u64,
    args: Vec<Value>,
    auth_token: Option<String>,
    legacy: bool,
}

impl EnvelopeBuilder {
    /// Set the callback id.
    #[must_use]
    pub fn callback_id(mut self, id: u64) -> Self {
        self.callback_id = id;
        self
    }

    /// Set the argument list.
    #[must_use]
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the auth token copy.
    #[must_use]
    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Set the legacy flag.
    #[must_use]
    pub fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// Finish the envelope.
    #[must_use]
    pub fn build(self) -> Envelope {
        Envelope {
            service: self.service,
            from: self.from,
            callback_id: self.callback_id,
            args: self.args,
            auth_token: self.auth_token,
            legacy: self.legacy,
        }
    }
}
