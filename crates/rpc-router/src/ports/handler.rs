//! # Service Handler Port
//!
//! What application code registers under a service name. A handler answers
//! synchronously by returning `Some(value)`, or takes the [`Responder`] from
//! its [`CallContext`] and answers later.

use parking_lot::Mutex;
use rpc_types::Envelope;
use serde_json::Value;
use std::fmt;

/// Pending response continuation, consumed on first use.
pub type Callback = Box<dyn FnOnce(Value) + Send>;

/// Handle for replying to one call after the handler has returned.
pub struct Responder {
    reply: Option<Callback>,
}

impl Responder {
    /// Wrap the router's reply path.
    pub(crate) fn new(reply: Callback) -> Self {
        Self { reply: Some(reply) }
    }

    /// Send `value` back to the caller.
    pub fn respond(mut self, value: Value) {
        if let Some(reply) = self.reply.take() {
            reply(value);
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.reply.is_some())
            .finish()
    }
}

/// What a handler learns about the call it is serving.
pub struct CallContext {
    service: String,
    sender: String,
    callback_id: u64,
    auth_token: Option<String>,
    legacy: bool,
    responder: Mutex<Option<Responder>>,
}

impl CallContext {
    pub(crate) fn new(envelope: &Envelope, responder: Option<Responder>) -> Self {
        Self {
            service: envelope.service().to_string(),
            sender: envelope.sender().to_string(),
            callback_id: envelope.callback_id(),
            auth_token: envelope.auth_token().map(str::to_string),
            legacy: envelope.is_legacy(),
            responder: Mutex::new(responder),
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Id of the calling context.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// 0 when the caller expects no answer.
    #[must_use]
    pub fn callback_id(&self) -> u64 {
        self.callback_id
    }

    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Take the responder for an asynchronous answer.
    ///
    /// `None` when the caller expects no answer or it was already taken.
    /// Once taken, a value returned from the handler is not sent.
    pub fn responder(&self) -> Option<Responder> {
        self.responder.lock().take()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("service", &self.service)
            .field("sender", &self.sender)
            .field("callback_id", &self.callback_id)
            .field("legacy", &self.legacy)
            .finish_non_exhaustive()
    }
}

/// Application code bound to a service name.
pub trait ServiceHandler: Send + Sync {
    /// Serve one call. `Some(value)` answers the caller right away.
    fn handle(&self, ctx: &CallContext, args: &[Value]) -> Option<Value>;
}

impl<F> ServiceHandler for F
where
    F: Fn(&CallContext, &[Value]) -> Option<Value> + Send + Sync,
{
    fn handle(&self, ctx: &CallContext, args: &[Value]) -> Option<Value> {
        self(ctx, args)
    }
}
