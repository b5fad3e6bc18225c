//! # Message Router
//!
//! One [`Router`] per execution context. It owns the service table, the call
//! registry, the per-peer endpoints and the transports, and moves envelopes
//! between the application and whichever channel each peer negotiated.
//!
//! ## Outbound Path
//!
//! ```text
//! call(target, service, cb, args)
//!   │  id = next_id(); register cb
//!   ▼
//! same-domain peer? ──yes──► peer event queue (no serialization)
//!   │ no
//!   ▼
//! endpoint confirmed? ──no──► early queue (drained on confirmation)
//!   │ yes
//!   ▼
//! noop if degraded │ ifpc if legacy │ assigned │ default
//!   │ send() == false
//!   ▼
//! assign noop, retry once via the default
//! ```
//!
//! ## Handshake
//!
//! `set_auth_token` starts setup. A successful `setup()` marks the endpoint
//! established and sends an ACK hello; the peer confirms and answers with a
//! reply ACK, which confirms this side. Transports that manage their own
//! connection confirm through `on_ready`. Running out of attempts assigns
//! noop and confirms, so queued calls drain into the log.
//!
//! ## Locking
//!
//! `outbound` serializes queue-or-send decisions and replays so delivery
//! order equals call order. It is always taken before `state`, and `state`
//! is never held while a transport, handler or callback runs.

use crate::adapters::TransportSet;
use crate::config::{parse_flag, GadgetRpcConfig, RpcConfig};
use crate::domain::same_domain::probe;
use crate::domain::{
    AttemptOutcome, CallRegistry, Endpoint, EndpointStatus, RetryPolicy, SameDomainProbe,
    ScheduledTask, SetupState,
};
use crate::metrics::{MetricsSnapshot, RouterMetrics};
use crate::ports::{
    CallContext, Callback, Responder, ServiceHandler, TransportCode, TransportHooks,
};
use parking_lot::Mutex;
use rpc_host::{ListenerId, Signal, Window};
use rpc_types::origin::absolutize;
use rpc_types::{
    is_reserved_service, resolve_relay_url, AuthFault, ConfigurationFault, Envelope, RpcError,
    TransportFault, ACK_SERVICE, CALLBACK_SERVICE, PARENT_ID,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// URL parameter carrying the auth token for the parent.
const TOKEN_PARAM: &str = "rpctoken";
/// Older spelling of [`TOKEN_PARAM`].
const LEGACY_TOKEN_PARAM: &str = "ifpctok";
/// URL parameter carrying the parent's address.
const PARENT_PARAM: &str = "parent";
/// URL parameter overriding early queueing.
const EARLY_QUEUE_PARAM: &str = "rpc_earlyq";

#[derive(Default)]
struct RouterState {
    endpoints: HashMap<String, Endpoint>,
    services: HashMap<String, Arc<dyn ServiceHandler>>,
    default_handler: Option<Arc<dyn ServiceHandler>>,
    callbacks: CallRegistry,
}

impl RouterState {
    fn endpoint(&mut self, target: &str) -> &mut Endpoint {
        self.endpoints.entry(target.to_string()).or_default()
    }
}

struct RouterInner {
    window: Arc<Window>,
    rpc_id: String,
    gadget_config: Option<GadgetRpcConfig>,
    early_queueing: bool,
    retry: RetryPolicy,
    transports: TransportSet,
    state: Mutex<RouterState>,
    outbound: Mutex<()>,
    metrics: RouterMetrics,
    same_domain_listener: Mutex<Option<ListenerId>>,
    ttl_task: Mutex<Option<ScheduledTask>>,
    shut_down: AtomicBool,
}

/// Per-context message router. Cloning yields another handle to the same
/// router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("rpc_id", &self.inner.rpc_id)
            .field("default_transport", &self.inner.transports.default_code())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Attach a router to `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationFault::InvalidConfig`] if `config` does not
    /// validate.
    pub fn new(window: Arc<Window>, config: RpcConfig) -> Result<Self, RpcError> {
        Self::build(window, config, None)
    }

    /// Attach a router to a gadget context with container-rendered settings.
    ///
    /// # Errors
    ///
    /// Same as [`Router::new`].
    pub fn with_gadget_config(
        window: Arc<Window>,
        config: RpcConfig,
        gadget_config: GadgetRpcConfig,
    ) -> Result<Self, RpcError> {
        Self::build(window, config, Some(gadget_config))
    }

    fn build(
        window: Arc<Window>,
        config: RpcConfig,
        gadget_config: Option<GadgetRpcConfig>,
    ) -> Result<Self, RpcError> {
        config.validate()?;

        let early_queueing = window
            .url_params()
            .get(EARLY_QUEUE_PARAM)
            .and_then(|value| parse_flag(value))
            .unwrap_or(config.early_queueing);
        let legacy = gadget_config
            .as_ref()
            .is_some_and(|gadget| gadget.use_legacy_protocol);
        let transports = TransportSet::select(&window, &config, legacy);

        let inner = Arc::new(RouterInner {
            rpc_id: window.name().to_string(),
            window,
            gadget_config,
            early_queueing,
            retry: RetryPolicy::new(config.setup_retry_interval(), config.setup_max_attempts),
            transports,
            state: Mutex::new(RouterState::default()),
            outbound: Mutex::new(()),
            metrics: RouterMetrics::new(),
            same_domain_listener: Mutex::new(None),
            ttl_task: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        inner
            .transports
            .init(&inner.window, &RouterInner::hooks(Arc::downgrade(&inner)));

        let weak = Arc::downgrade(&inner);
        let listener = inner.window.add_listener(Arc::new(move |signal: &Signal| {
            if let (Signal::SameDomain(envelope), Some(inner)) = (signal, weak.upgrade()) {
                inner.handle_inbound(envelope.clone());
            }
        }));
        *inner.same_domain_listener.lock() = Some(listener);
        inner.window.set_rpc_exposed(true);

        if let Some(ttl) = config.callback_ttl() {
            let weak = Arc::downgrade(&inner);
            let period = (ttl / 2).max(Duration::from_millis(1));
            *inner.ttl_task.lock() = ScheduledTask::every(period, move || match weak.upgrade() {
                Some(inner) => {
                    inner.evict_expired(ttl);
                    true
                }
                None => false,
            });
        }

        info!(
            rpc_id = %inner.rpc_id,
            transport = %inner.transports.default_code(),
            early_queueing,
            "Router attached"
        );

        let router = Self { inner };
        if router.inner.window.has_parent() {
            match router.setup_receiver(PARENT_ID, None, None) {
                Ok(()) => {}
                Err(RpcError::Configuration(ConfigurationFault::MissingRelayAddress { .. })) => {
                    debug!(rpc_id = %router.inner.rpc_id, "No parent relay address, skipping parent setup");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(router)
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    /// Bind `handler` to `service`, replacing any earlier binding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationFault::ReservedService`] for `__cb`, `__ack`
    /// and the empty name.
    pub fn register<H>(&self, service: &str, handler: H) -> Result<(), RpcError>
    where
        H: ServiceHandler + 'static,
    {
        reject_reserved(service)?;
        self.inner
            .state
            .lock()
            .services
            .insert(service.to_string(), Arc::new(handler));
        debug!(service, "Service registered");
        Ok(())
    }

    /// Remove the binding for `service`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Same as [`Router::register`].
    pub fn unregister(&self, service: &str) -> Result<bool, RpcError> {
        reject_reserved(service)?;
        Ok(self.inner.state.lock().services.remove(service).is_some())
    }

    /// Serve every service without its own binding.
    pub fn register_default<H>(&self, handler: H)
    where
        H: ServiceHandler + 'static,
    {
        self.inner.state.lock().default_handler = Some(Arc::new(handler));
    }

    pub fn unregister_default(&self) {
        self.inner.state.lock().default_handler = None;
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Invoke `service` on `target`. An empty target means the parent.
    ///
    /// Returns the call id, which is also the callback id on the wire when
    /// `callback` is given. Delivery is fire-and-forget.
    pub fn call(
        &self,
        target: &str,
        service: &str,
        callback: Option<Callback>,
        args: Vec<Value>,
    ) -> u64 {
        self.inner.call(target, service, callback, args)
    }

    /// Invoke `service` on `target` and receive the result on a channel.
    ///
    /// The receiver errors if the router shuts down or evicts the callback
    /// before a response arrives.
    pub fn request(&self, target: &str, service: &str, args: Vec<Value>) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let callback: Callback = Box::new(move |value| {
            let _ = tx.send(value);
        });
        self.inner.call(target, service, Some(callback), args);
        rx
    }

    /// Run the inbound pipeline on one decoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Auth`] when the envelope's token does not match
    /// the token recorded for its sender; no handler runs in that case.
    pub fn process(&self, envelope: Envelope) -> Result<(), RpcError> {
        self.inner.process(envelope)
    }

    /// Entry point for envelopes handed over by a same-origin peer.
    ///
    /// # Errors
    ///
    /// Same as [`Router::process`].
    pub fn receive_same_domain(&self, envelope: Envelope) -> Result<(), RpcError> {
        self.inner.process(envelope)
    }

    // =========================================================================
    // ENDPOINT CONFIGURATION
    // =========================================================================

    /// Record where `target` can be reached and whether it speaks the legacy
    /// format. Last write wins until setup completes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationFault::EndpointSealed`] once setup finished.
    pub fn set_relay_address(&self, target: &str, url: &str, legacy: bool) -> Result<(), RpcError> {
        let target = normalize_target(target);
        let mut state = self.inner.state.lock();
        let endpoint = state.endpoint(target);
        if endpoint.setup.is_sealed() {
            return Err(ConfigurationFault::EndpointSealed {
                target: target.to_string(),
            }
            .into());
        }
        endpoint.relay_url = Some(url.to_string());
        endpoint.legacy = legacy;
        endpoint.same_domain = SameDomainProbe::Unknown;
        debug!(target, relay = url, legacy, "Relay address set");
        Ok(())
    }

    /// Relay address recorded for `target`, made absolute.
    #[must_use]
    pub fn relay_address(&self, target: &str) -> Option<String> {
        self.inner.relay_url(normalize_target(target))
    }

    /// Record the token shared with `target` and start the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationFault::EndpointSealed`] once setup finished.
    pub fn set_auth_token(&self, target: &str, token: &str) -> Result<(), RpcError> {
        let target = normalize_target(target);
        let pending_retry = {
            let mut state = self.inner.state.lock();
            let endpoint = state.endpoint(target);
            if endpoint.setup.is_sealed() {
                return Err(ConfigurationFault::EndpointSealed {
                    target: target.to_string(),
                }
                .into());
            }
            endpoint.auth_token = Some(token.to_string());
            endpoint.retry.take()
        };
        drop(pending_retry);
        RouterInner::attempt_setup(&self.inner, target);
        Ok(())
    }

    /// Token recorded for `target`.
    #[must_use]
    pub fn auth_token(&self, target: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .endpoints
            .get(normalize_target(target))
            .and_then(|endpoint| endpoint.auth_token.clone())
    }

    /// Derive relay address and token for `target` and start the handshake.
    ///
    /// For the parent (`".."`) the token comes from `token`, else the
    /// `rpctoken` or `ifpctok` parameter of this context's address. The relay
    /// is the gadget configuration's parent relay when present, else `relay`,
    /// else the `parent` parameter. For a child the relay defaults to the
    /// child's address and the token to its `rpctoken` parameter.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationFault::MissingRelayAddress`]: no parent relay known
    /// - [`ConfigurationFault::UnknownTarget`]: no child with that id
    /// - [`ConfigurationFault::EndpointSealed`]: setup already finished
    pub fn setup_receiver(
        &self,
        target: &str,
        relay: Option<&str>,
        token: Option<&str>,
    ) -> Result<(), RpcError> {
        let target = normalize_target(target);
        let (relay, token, legacy) = if target == PARENT_ID {
            self.inner.parent_receiver(relay, token)?
        } else {
            let child = self.inner.window.child(target).ok_or_else(|| {
                ConfigurationFault::UnknownTarget {
                    target: target.to_string(),
                }
            })?;
            let relay = relay.map_or_else(|| child.location().to_string(), str::to_string);
            let token = match token {
                Some(token) => token.to_string(),
                None => child
                    .url_params()
                    .remove(TOKEN_PARAM)
                    .unwrap_or_default(),
            };
            (relay, token, false)
        };
        self.set_relay_address(target, &relay, legacy)?;
        self.set_auth_token(target, &token)
    }

    /// Replace a default transport that cannot verify its receiver with the
    /// fragment transport. Existing assignments are kept.
    pub fn force_verifiable_transport(&self) {
        if self.inner.transports.force_verifiable() {
            info!(
                rpc_id = %self.inner.rpc_id,
                transport = %self.inner.transports.default_code(),
                "Switched to a relay-verifiable default transport"
            );
        }
    }

    /// Default transport of this context.
    #[must_use]
    pub fn relay_channel(&self) -> TransportCode {
        self.inner.transports.default_code()
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Rpc id of the local context.
    #[must_use]
    pub fn rpc_id(&self) -> &str {
        &self.inner.rpc_id
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    #[must_use]
    pub fn endpoint_status(&self, target: &str) -> Option<EndpointStatus> {
        let target = normalize_target(target);
        self.inner
            .state
            .lock()
            .endpoints
            .get(target)
            .map(|endpoint| endpoint.status(target))
    }

    /// Callbacks still waiting for a response.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.inner.state.lock().callbacks.len()
    }

    /// Detach from the context: cancel retries and eviction, drop every
    /// registry and stop the transports. Further inbound traffic is ignored.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let (retries, dropped_callbacks) = {
            let mut state = self.inner.state.lock();
            let retries: Vec<ScheduledTask> = state
                .endpoints
                .values_mut()
                .filter_map(|endpoint| endpoint.retry.take())
                .collect();
            state.services.clear();
            state.default_handler = None;
            let dropped = state.callbacks.clear();
            (retries, dropped)
        };
        drop(retries);
        self.inner.ttl_task.lock().take();
        if let Some(listener) = self.inner.same_domain_listener.lock().take() {
            self.inner.window.remove_listener(listener);
        }
        self.inner.transports.shutdown();
        self.inner.window.set_rpc_exposed(false);
        info!(rpc_id = %self.inner.rpc_id, dropped_callbacks, "Router shut down");
    }
}

impl RouterInner {
    fn hooks(weak: Weak<RouterInner>) -> TransportHooks {
        let on_message = weak.clone();
        let on_ready = weak.clone();
        let relay_url = weak;
        TransportHooks {
            on_message: Arc::new(move |envelope| {
                if let Some(inner) = on_message.upgrade() {
                    inner.handle_inbound(envelope);
                }
            }),
            on_ready: Arc::new(move |target: &str, success| {
                if let Some(inner) = on_ready.upgrade() {
                    inner.on_ready(target, success);
                }
            }),
            relay_url: Arc::new(move |target: &str| {
                relay_url.upgrade().and_then(|inner| inner.relay_url(target))
            }),
        }
    }

    fn relay_url(&self, target: &str) -> Option<String> {
        self.state
            .lock()
            .endpoints
            .get(target)
            .and_then(|endpoint| endpoint.relay_url.as_deref())
            .map(|url| absolutize(url, self.window.scheme()))
    }

    /// Local id as `target` knows it.
    fn from_for(&self, target: &str) -> String {
        if target == PARENT_ID {
            self.rpc_id.clone()
        } else {
            PARENT_ID.to_string()
        }
    }

    fn channel_for(&self, endpoint: &Endpoint, legacy: bool) -> TransportCode {
        if endpoint.is_degraded() {
            TransportCode::Noop
        } else if legacy {
            TransportCode::Fragment
        } else {
            endpoint
                .transport
                .unwrap_or_else(|| self.transports.default_code())
        }
    }

    // -------------------------------------------------------------------------
    // outbound
    // -------------------------------------------------------------------------

    fn call(
        &self,
        target: &str,
        service: &str,
        callback: Option<Callback>,
        args: Vec<Value>,
    ) -> u64 {
        let target = normalize_target(target);
        let from = self.from_for(target);
        RouterMetrics::incr(&self.metrics.calls);

        let _outbound = self.outbound.lock();
        let mut state = self.state.lock();
        let id = state.callbacks.next_id();
        let callback_id = match callback {
            Some(callback) => {
                state.callbacks.register(id, target, service, callback);
                id
            }
            None => 0,
        };

        let endpoint = state.endpoint(target);
        let envelope = Envelope::builder(service, from.as_str())
            .callback_id(callback_id)
            .args(args)
            .auth_token(endpoint.auth_token.clone())
            .legacy(endpoint.legacy)
            .build();

        if endpoint.same_domain == SameDomainProbe::Unknown {
            let peer = self.window.resolve(target);
            endpoint.same_domain = probe(&self.window, endpoint.relay_url.as_deref(), peer.as_deref());
            debug!(target, outcome = ?endpoint.same_domain, "Same-domain probe");
        }
        let envelope = if endpoint.same_domain == SameDomainProbe::Available {
            drop(state);
            match self.deliver_same_domain(target, envelope) {
                None => return id,
                Some(envelope) => {
                    state = self.state.lock();
                    envelope
                }
            }
        } else {
            envelope
        };

        let endpoint = state.endpoint(target);
        let envelope = if self.early_queueing && !endpoint.confirmed {
            match endpoint.queue.push(envelope) {
                Ok(()) => {
                    RouterMetrics::incr(&self.metrics.queued);
                    debug!(target, service, callback_id, "Call queued until the endpoint confirms");
                    return id;
                }
                Err(envelope) => envelope,
            }
        } else {
            envelope
        };
        let code = self.channel_for(endpoint, envelope.is_legacy());
        drop(state);

        self.send_via(target, &from, &envelope, code);
        id
    }

    /// Hand `envelope` to a same-origin peer. Gives it back when the peer
    /// is gone.
    fn deliver_same_domain(&self, target: &str, envelope: Envelope) -> Option<Envelope> {
        let Some(peer) = self.window.resolve(target) else {
            return Some(envelope);
        };
        if peer.dispatch(Signal::SameDomain(envelope.clone())) {
            RouterMetrics::incr(&self.metrics.same_domain_deliveries);
            debug!(target, service = envelope.service(), "Delivered same-domain");
            None
        } else {
            Some(envelope)
        }
    }

    /// Send through `code`; on refusal degrade the endpoint to noop and try
    /// the default once.
    fn send_via(&self, target: &str, from: &str, envelope: &Envelope, code: TransportCode) {
        if self.transports.get(code).send(target, from, envelope) {
            RouterMetrics::incr(&self.metrics.sends);
            return;
        }
        RouterMetrics::incr(&self.metrics.fallbacks);
        let fault = TransportFault::SendRejected {
            transport: code.to_string(),
            target: target.to_string(),
        };
        warn!(
            service = envelope.service(),
            error = %fault,
            "Send failed, endpoint degraded to noop"
        );
        self.state
            .lock()
            .endpoint(target)
            .assign_transport(TransportCode::Noop);

        let fallback = self.transports.default_transport();
        if !fallback.send(target, from, envelope) {
            debug!(target, transport = %fallback.code(), "Fallback send failed too");
        }
    }

    /// Handshake acknowledgement. Bypasses the early queue and does not use
    /// a call id.
    fn send_ack(&self, target: &str, reply: bool) {
        let from = self.from_for(target);
        let _outbound = self.outbound.lock();
        let (envelope, code) = {
            let mut state = self.state.lock();
            let endpoint = state.endpoint(target);
            let mut builder = Envelope::builder(ACK_SERVICE, from.as_str())
                .auth_token(endpoint.auth_token.clone())
                .legacy(endpoint.legacy);
            if reply {
                builder = builder.arg(true);
            }
            let envelope = builder.build();
            let code = self.channel_for(endpoint, envelope.is_legacy());
            (envelope, code)
        };
        debug!(target, reply, transport = %code, "Sending ACK");
        self.send_via(target, &from, &envelope, code);
    }

    // -------------------------------------------------------------------------
    // handshake
    // -------------------------------------------------------------------------

    fn attempt_setup(inner: &Arc<RouterInner>, target: &str) {
        if inner.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let (token, code) = {
            let mut state = inner.state.lock();
            let endpoint = state.endpoint(target);
            if endpoint.setup.is_sealed() {
                return;
            }
            let token = endpoint.auth_token.clone().unwrap_or_default();
            (token, inner.channel_for(endpoint, endpoint.legacy))
        };

        RouterMetrics::incr(&inner.metrics.setup_attempts);
        let reachable = inner.window.resolve(target).is_some();
        let succeeded = reachable && inner.transports.get(code).setup(target, &token);

        let outcome = {
            let mut state = inner.state.lock();
            let endpoint = state.endpoint(target);
            if endpoint.setup.is_sealed() {
                return;
            }
            let outcome = inner.retry.after_attempt(&mut endpoint.setup, succeeded);
            if outcome == AttemptOutcome::Established && endpoint.transport.is_none() {
                endpoint.assign_transport(code);
            }
            outcome
        };

        match outcome {
            AttemptOutcome::Established => {
                info!(target, transport = %code, "Endpoint established");
                inner.send_ack(target, false);
            }
            AttemptOutcome::RetryAfter(delay) => {
                debug!(target, transport = %code, reachable, "Setup not ready, retrying");
                let weak = Arc::downgrade(inner);
                let retry_target = target.to_string();
                let task = ScheduledTask::after(delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        RouterInner::attempt_setup(&inner, &retry_target);
                    }
                });
                let previous = {
                    let mut state = inner.state.lock();
                    std::mem::replace(&mut state.endpoint(target).retry, task)
                };
                drop(previous);
            }
            AttemptOutcome::Exhausted { attempts } => {
                RouterMetrics::incr(&inner.metrics.setup_exhausted);
                let fault = TransportFault::SetupExhausted {
                    target: target.to_string(),
                    attempts,
                };
                warn!(transport = %code, error = %fault, "Endpoint degraded to noop");
                inner
                    .state
                    .lock()
                    .endpoint(target)
                    .assign_transport(TransportCode::Noop);
                inner.confirm(target, false);
            }
        }
    }

    /// Transport-reported readiness.
    fn on_ready(&self, target: &str, success: bool) {
        let retry = {
            let mut state = self.state.lock();
            let endpoint = state.endpoint(target);
            if success {
                if !endpoint.setup.is_sealed() {
                    endpoint.setup = SetupState::Established;
                }
            } else {
                endpoint.setup = SetupState::Failed;
                endpoint.assign_transport(TransportCode::Noop);
            }
            endpoint.retry.take()
        };
        drop(retry);
        debug!(target, success, "Transport reported readiness");
        self.confirm(target, success);
    }

    /// Mark `target` responsive, finish its handshake, and replay its early
    /// queue once.
    fn confirm(&self, target: &str, success: bool) {
        let _outbound = self.outbound.lock();
        let (queued, retry) = {
            let mut state = self.state.lock();
            let default = self.transports.default_code();
            let endpoint = state.endpoint(target);
            if !success {
                endpoint.assign_transport(TransportCode::Noop);
            } else if endpoint.transport.is_none() {
                endpoint.assign_transport(default);
            }
            if !endpoint.setup.is_sealed() {
                endpoint.setup = if success {
                    SetupState::Established
                } else {
                    SetupState::Failed
                };
            }
            let retry = endpoint.retry.take();
            if endpoint.confirmed {
                (None, retry)
            } else {
                endpoint.confirmed = true;
                let token = endpoint.auth_token.clone();
                (Some(endpoint.queue.drain(token.as_deref())), retry)
            }
        };
        drop(retry);
        let Some(queued) = queued else {
            return;
        };

        info!(target, success, drained = queued.len(), "Endpoint confirmed");
        RouterMetrics::add(&self.metrics.drained, queued.len() as u64);
        let from = self.from_for(target);
        for envelope in queued {
            let code = {
                let mut state = self.state.lock();
                let endpoint = state.endpoint(target);
                self.channel_for(endpoint, envelope.is_legacy())
            };
            self.send_via(target, &from, &envelope, code);
        }
    }

    // -------------------------------------------------------------------------
    // inbound
    // -------------------------------------------------------------------------

    /// Transport boundary: run `process` and log what it rejects.
    fn handle_inbound(self: &Arc<Self>, envelope: Envelope) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let service = envelope.service().to_string();
        match self.process(envelope) {
            Ok(()) => {}
            Err(e) if e.is_auth_fault() => {
                error!(rpc_id = %self.rpc_id, service = %service, error = %e, "Rejected inbound call");
            }
            Err(e) => warn!(rpc_id = %self.rpc_id, service = %service, error = %e, "Inbound call failed"),
        }
    }

    fn process(self: &Arc<Self>, envelope: Envelope) -> Result<(), RpcError> {
        RouterMetrics::incr(&self.metrics.processed);
        let sender = envelope.sender().to_string();

        {
            let state = self.state.lock();
            let expected = state
                .endpoints
                .get(&sender)
                .and_then(Endpoint::expected_token);
            if let Some(expected) = expected {
                if envelope.auth_token() != Some(expected) {
                    RouterMetrics::incr(&self.metrics.auth_faults);
                    return Err(AuthFault {
                        sender,
                        token_present: envelope.auth_token().is_some(),
                    }
                    .into());
                }
            }
        }

        if envelope.is_ack() {
            // Legacy fragments carry every argument as a string.
            let is_reply = match envelope.args().first() {
                Some(Value::Bool(flag)) => *flag,
                Some(Value::String(flag)) => flag == "true",
                _ => false,
            };
            let known = self.state.lock().endpoints.contains_key(&sender)
                || self.window.resolve(&sender).is_some();
            if !known {
                debug!(sender = %sender, "ACK from unknown context ignored");
                return Ok(());
            }
            debug!(sender = %sender, is_reply, "ACK received");
            self.confirm(&sender, true);
            if !is_reply {
                self.send_ack(&sender, true);
            }
            return Ok(());
        }

        if envelope.is_callback() {
            self.fire_callback(&envelope);
            return Ok(());
        }

        let handler = {
            let state = self.state.lock();
            let handler = state
                .services
                .get(envelope.service())
                .or(state.default_handler.as_ref())
                .cloned();
            handler
        };
        let Some(handler) = handler else {
            RouterMetrics::incr(&self.metrics.unknown_services);
            warn!(
                service = envelope.service(),
                sender = %sender,
                "No handler registered, call ignored"
            );
            return Ok(());
        };

        let callback_id = envelope.callback_id();
        let responder = (callback_id != 0).then(|| self.responder(&sender, callback_id));
        let ctx = CallContext::new(&envelope, responder);
        if let Some(result) = handler.handle(&ctx, envelope.args()) {
            if callback_id != 0 {
                self.call(&sender, CALLBACK_SERVICE, None, vec![json!(callback_id), result]);
            }
        }
        Ok(())
    }

    fn responder(self: &Arc<Self>, sender: &str, callback_id: u64) -> Responder {
        let weak = Arc::downgrade(self);
        let sender = sender.to_string();
        Responder::new(Box::new(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner.call(&sender, CALLBACK_SERVICE, None, vec![json!(callback_id), value]);
            }
        }))
    }

    fn fire_callback(&self, envelope: &Envelope) {
        let args = envelope.args();
        let id = args.first().and_then(Value::as_u64).unwrap_or(0);
        let callback = self.state.lock().callbacks.take(id);
        match callback {
            Some(callback) => {
                RouterMetrics::incr(&self.metrics.callbacks_fired);
                callback(args.get(1).cloned().unwrap_or(Value::Null));
            }
            None => {
                RouterMetrics::incr(&self.metrics.callbacks_ignored);
                debug!(callback_id = id, sender = envelope.sender(), "No pending callback, response ignored");
            }
        }
    }

    fn evict_expired(&self, ttl: Duration) {
        let evicted = self.state.lock().callbacks.remove_expired(ttl);
        if evicted > 0 {
            RouterMetrics::add(&self.metrics.callbacks_evicted, evicted as u64);
        }
    }

    fn parent_receiver(
        &self,
        relay: Option<&str>,
        token: Option<&str>,
    ) -> Result<(String, String, bool), RpcError> {
        let mut params = self.window.url_params();
        let token = token
            .map(str::to_string)
            .or_else(|| params.remove(TOKEN_PARAM))
            .or_else(|| params.remove(LEGACY_TOKEN_PARAM))
            .unwrap_or_default();
        let parent = params.remove(PARENT_PARAM);

        if let Some(gadget) = &self.gadget_config {
            let relay = resolve_relay_url(
                &gadget.parent_relay_url,
                parent.as_deref(),
                self.window.scheme(),
            );
            return Ok((relay, token, gadget.use_legacy_protocol));
        }
        let relay = relay
            .map(str::to_string)
            .or(parent)
            .ok_or_else(|| ConfigurationFault::MissingRelayAddress {
                target: PARENT_ID.to_string(),
            })?;
        Ok((relay, token, false))
    }
}

/// Empty target ids address the parent.
fn normalize_target(target: &str) -> &str {
    if target.is_empty() {
        PARENT_ID
    } else {
        target
    }
}

fn reject_reserved(service: &str) -> Result<(), RpcError> {
    if is_reserved_service(service) {
        return Err(ConfigurationFault::ReservedService {
            name: service.to_string(),
        }
        .into());
    }
    Ok(())
}
