//! # Embedding Fixture
//!
//! A container page with one embedded gadget `g1`, each side running its
//! own [`Router`] on its own simulated context. The container starts setup
//! for the gadget as soon as the fixture is built; the gadget router is
//! attached separately so tests can act before the gadget is listening.

use parking_lot::Mutex;
use rpc_host::{Capabilities, Window};
use rpc_router::{CallContext, RpcConfig, RpcConfigBuilder, Router, ServiceHandler};
use rpc_types::origin::percent_encode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub const CONTAINER_URL: &str = "http://container.test/index.html";
pub const FOREIGN_ORIGIN: &str = "http://gadgets.test";
pub const SAME_ORIGIN: &str = "http://container.test";
pub const GADGET_ID: &str = "g1";
pub const TOKEN: &str = "tok-g1";

/// Upper bound for anything a test waits on.
pub const PATIENCE: Duration = Duration::from_secs(2);

/// Address of a gadget page served from `origin`.
#[must_use]
pub fn gadget_url(origin: &str, token: Option<&str>) -> String {
    let mut url = format!(
        "{origin}/gadget.html?parent={}",
        percent_encode(CONTAINER_URL)
    );
    if let Some(token) = token {
        url.push_str("#rpctoken=");
        url.push_str(token);
    }
    url
}

/// Short retry and poll intervals so paused-clock tests stay brief.
#[must_use]
pub fn fast_config() -> RpcConfig {
    RpcConfigBuilder::new()
        .setup_retry_interval_ms(20)
        .setup_max_attempts(10)
        .relay_poll_interval_ms(10)
        .build()
        .unwrap()
}

pub struct Embedding {
    pub top: Arc<Window>,
    pub child: Arc<Window>,
    pub container: Router,
}

impl Embedding {
    /// Container plus gadget context; both sides share `capabilities`.
    pub fn new(capabilities: Capabilities, origin: &str) -> Self {
        Self::with(capabilities, capabilities, origin, fast_config())
    }

    pub fn with(
        container_caps: Capabilities,
        gadget_caps: Capabilities,
        origin: &str,
        config: RpcConfig,
    ) -> Self {
        let top = Window::root("top", CONTAINER_URL, container_caps).unwrap();
        let child = top
            .open_child(GADGET_ID, gadget_url(origin, Some(TOKEN)), gadget_caps)
            .unwrap();
        let container = Router::new(Arc::clone(&top), config).unwrap();
        container.setup_receiver(GADGET_ID, None, None).unwrap();
        Self {
            top,
            child,
            container,
        }
    }

    /// Attach the gadget-side router. Construction starts its parent setup.
    pub fn attach_gadget(&self) -> Router {
        self.attach_gadget_with(fast_config())
    }

    pub fn attach_gadget_with(&self, config: RpcConfig) -> Router {
        Router::new(Arc::clone(&self.child), config).unwrap()
    }

    pub fn shutdown(&self, gadget: &Router) {
        gadget.shutdown();
        self.container.shutdown();
    }
}

/// Handler answering with its first argument.
pub fn echo() -> impl ServiceHandler {
    |_: &CallContext, args: &[Value]| args.first().cloned()
}

/// Records `[service, sender, callbackId, args]` for every call it serves.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that records the call, then answers with `answer(args)`.
    pub fn handler<F>(&self, answer: F) -> impl ServiceHandler
    where
        F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        let calls = Arc::clone(&self.calls);
        move |ctx: &CallContext, args: &[Value]| {
            calls
                .lock()
                .push(json!([ctx.service(), ctx.sender(), ctx.callback_id(), args]));
            answer(args)
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    /// Wait until at least `count` calls were recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(PATIENCE, async {
            loop {
                if self.calls.lock().len() >= count {
                    return self.calls();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} calls, saw {:?}", self.calls()))
    }
}

/// Await a response, failing the test if none arrives in time.
pub async fn reply(pending: oneshot::Receiver<Value>) -> Value {
    tokio::time::timeout(PATIENCE, pending)
        .await
        .expect("timed out waiting for a response")
        .expect("callback dropped before a response")
}

/// Give event loops and timers time to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}
