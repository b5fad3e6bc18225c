//! # Execution Contexts
//!
//! A [`Window`] is one execution context: a container page or a gadget frame
//! embedded in it. Each window owns:
//!
//! - an event loop (a tokio task draining an unbounded queue of
//!   [`Signal`]s) that runs listeners one at a time
//! - a registry of embedded children keyed by id, and a weak link to its
//!   parent
//! - the shared primitives peers may touch: a bridge slot, the embedding
//!   frame element, relay resources keyed by peer id, and relay-page
//!   navigation
//!
//! ## Origin Rules
//!
//! Two windows may access each other directly only when their origins are
//! equal. The message channel drops payloads whose target origin does not
//! match the receiver, and relay navigation only reaches the receiver when
//! the relay address is hosted on the receiver's origin.

use crate::capabilities::Capabilities;
use crate::errors::HostError;
use crate::primitives::{Bridge, FrameElement, RelayResource};
use crate::signal::Signal;
use parking_lot::RwLock;
use rpc_types::origin::{origin_of, scheme_of, url_params};
use rpc_types::PARENT_ID;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Callback run on the event loop for every signal.
pub type Listener = Arc<dyn Fn(&Signal) + Send + Sync>;

/// Handle returned by [`Window::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Wildcard target origin accepted by [`Window::post_message`].
pub const ANY_ORIGIN: &str = "*";

/// One execution context.
pub struct Window {
    name: String,
    location: String,
    capabilities: Capabilities,
    parent: Option<Weak<Window>>,
    children: RwLock<HashMap<String, Arc<Window>>>,
    events: mpsc::UnboundedSender<Signal>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    rpc_exposed: AtomicBool,
    bridge: RwLock<Option<Arc<Bridge>>>,
    frame_element: Option<Arc<FrameElement>>,
    relays: RwLock<HashMap<String, Arc<RelayResource>>>,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Window {
    /// Create a top-level context.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NoRuntime`] outside a tokio runtime.
    pub fn root(
        name: impl Into<String>,
        location: impl Into<String>,
        capabilities: Capabilities,
    ) -> Result<Arc<Self>, HostError> {
        Self::create(name.into(), location.into(), capabilities, None)
    }

    /// Embed a child context under `id`.
    ///
    /// The child's name (its rpc id) is `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::DuplicateChild`] if `id` is taken.
    pub fn open_child(
        self: &Arc<Self>,
        id: impl Into<String>,
        location: impl Into<String>,
        capabilities: Capabilities,
    ) -> Result<Arc<Self>, HostError> {
        let id = id.into();
        if self.children.read().contains_key(&id) {
            return Err(HostError::DuplicateChild { id });
        }
        let child = Self::create(
            id.clone(),
            location.into(),
            capabilities,
            Some(Arc::downgrade(self)),
        )?;

        let mut children = self.children.write();
        if children.contains_key(&id) {
            return Err(HostError::DuplicateChild { id });
        }
        children.insert(id.clone(), Arc::clone(&child));
        debug!(parent = %self.name, child = %id, "Child context opened");
        Ok(child)
    }

    fn create(
        name: String,
        location: String,
        capabilities: Capabilities,
        parent: Option<Weak<Window>>,
    ) -> Result<Arc<Self>, HostError> {
        let handle = Handle::try_current().map_err(|_| HostError::NoRuntime { name: name.clone() })?;
        let (tx, rx) = mpsc::unbounded_channel();
        let frame_element = parent.as_ref().map(|_| Arc::new(FrameElement::new()));

        let window = Arc::new_cyclic(|weak: &Weak<Window>| {
            handle.spawn(run_event_loop(weak.clone(), rx));
            Window {
                name,
                location,
                capabilities,
                parent,
                children: RwLock::new(HashMap::new()),
                events: tx,
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                rpc_exposed: AtomicBool::new(false),
                bridge: RwLock::new(None),
                frame_element,
                relays: RwLock::new(HashMap::new()),
            }
        });
        Ok(window)
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Rpc id of this context.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address this context was loaded from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Scheme of [`location`](Self::location), `http` when absent.
    #[must_use]
    pub fn scheme(&self) -> &str {
        scheme_of(&self.location).unwrap_or("http")
    }

    /// Canonical origin of [`location`](Self::location).
    #[must_use]
    pub fn origin(&self) -> String {
        origin_of(&self.location, self.scheme())
    }

    /// Query and fragment parameters of [`location`](Self::location).
    #[must_use]
    pub fn url_params(&self) -> HashMap<String, String> {
        url_params(&self.location)
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    // =========================================================================
    // TREE
    // =========================================================================

    /// Embedding context, if this is a child that is still attached.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Window>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Whether this context was created as a child.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Child registered under `id`.
    #[must_use]
    pub fn child(&self, id: &str) -> Option<Arc<Window>> {
        self.children.read().get(id).cloned()
    }

    /// Detach and return the child registered under `id`.
    pub fn remove_child(&self, id: &str) -> Option<Arc<Window>> {
        let removed = self.children.write().remove(id);
        if removed.is_some() {
            debug!(parent = %self.name, child = %id, "Child context removed");
        }
        removed
    }

    /// Ids of all registered children.
    #[must_use]
    pub fn child_ids(&self) -> Vec<String> {
        self.children.read().keys().cloned().collect()
    }

    /// Resolve a target id: `".."` is the parent, anything else a child.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<Arc<Window>> {
        if target == PARENT_ID {
            self.parent()
        } else {
            self.child(target)
        }
    }

    /// Id under which `peer` knows this context: `".."` when this context
    /// is `peer`'s parent, otherwise this context's name.
    #[must_use]
    pub fn id_seen_by(&self, target: &str) -> String {
        if target == PARENT_ID {
            self.name.clone()
        } else {
            PARENT_ID.to_string()
        }
    }

    // =========================================================================
    // EVENT LOOP
    // =========================================================================

    /// Register a listener. Listeners run on the event loop in registration
    /// order.
    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Drop every listener.
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    /// Queue a signal for the event loop. Returns false once the loop has
    /// stopped.
    pub fn dispatch(&self, signal: Signal) -> bool {
        trace!(window = %self.name, kind = signal.kind(), "Signal queued");
        self.events.send(signal).is_ok()
    }

    fn listeners_snapshot(&self) -> Vec<Listener> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    // =========================================================================
    // ACCESS RULES
    // =========================================================================

    /// Whether this context may touch `other` directly.
    #[must_use]
    pub fn can_access(&self, other: &Window) -> bool {
        let origin = self.origin();
        !origin.is_empty() && origin == other.origin()
    }

    /// Mark that a router is attached to this context.
    pub fn set_rpc_exposed(&self, exposed: bool) {
        self.rpc_exposed.store(exposed, Ordering::SeqCst);
    }

    /// Whether a router is attached to this context.
    #[must_use]
    pub fn rpc_exposed(&self) -> bool {
        self.rpc_exposed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // PRIMITIVES
    // =========================================================================

    /// Post `data` to this context from a context at `source_origin`.
    ///
    /// Dropped unless `target_origin` is [`ANY_ORIGIN`] or equals this
    /// context's origin. Returns whether the payload was queued.
    pub fn post_message(&self, data: String, target_origin: &str, source_origin: &str) -> bool {
        if !self.capabilities.post_message {
            return false;
        }
        if target_origin != ANY_ORIGIN && target_origin != self.origin() {
            debug!(
                window = %self.name,
                target_origin,
                "Message dropped: target origin mismatch"
            );
            return false;
        }
        self.dispatch(Signal::Message {
            data,
            origin: source_origin.to_string(),
        })
    }

    /// Expose a bridge guarded by `token`, or update the token of the one
    /// already exposed.
    pub fn expose_bridge(&self, token: &str) -> Arc<Bridge> {
        let mut slot = self.bridge.write();
        match slot.as_ref() {
            Some(bridge) => {
                bridge.set_token(token);
                Arc::clone(bridge)
            }
            None => {
                let bridge = Arc::new(Bridge::new(token));
                *slot = Some(Arc::clone(&bridge));
                bridge
            }
        }
    }

    /// Bridge exposed by this context, if any.
    #[must_use]
    pub fn bridge(&self) -> Option<Arc<Bridge>> {
        self.bridge.read().clone()
    }

    /// Embedding element; only children have one.
    #[must_use]
    pub fn frame_element(&self) -> Option<Arc<FrameElement>> {
        self.frame_element.clone()
    }

    /// Relay resource hosted here for `peer`, created on first use.
    pub fn relay_resource(&self, peer: &str) -> Arc<RelayResource> {
        if let Some(existing) = self.relays.read().get(peer) {
            return Arc::clone(existing);
        }
        Arc::clone(
            self.relays
                .write()
                .entry(peer.to_string())
                .or_insert_with(|| Arc::new(RelayResource::new())),
        )
    }

    /// All relay resources hosted here, keyed by peer id.
    #[must_use]
    pub fn relay_resources(&self) -> Vec<(String, Arc<RelayResource>)> {
        self.relays
            .read()
            .iter()
            .map(|(peer, relay)| (peer.clone(), Arc::clone(relay)))
            .collect()
    }

    /// Navigate one of this context's relay pages to `url`.
    ///
    /// The fragment reaches this context only when `url` is hosted on its
    /// origin. Returns whether it was delivered.
    pub fn navigate_relay(&self, url: &str) -> bool {
        let Some((address, fragment)) = url.split_once('#') else {
            return false;
        };
        if origin_of(address, self.scheme()) != self.origin() {
            debug!(window = %self.name, relay = %address, "Relay navigation on foreign origin");
            return false;
        }
        self.dispatch(Signal::FragmentNavigated {
            fragment: fragment.to_string(),
        })
    }
}

async fn run_event_loop(window: Weak<Window>, mut events: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = events.recv().await {
        let Some(window) = window.upgrade() else {
            break;
        };
        for listener in window.listeners_snapshot() {
            listener(&signal);
        }
    }
}
