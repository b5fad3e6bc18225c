//! # Security Flows
//!
//! Hostile traffic injected straight into a context's message channel:
//! forged senders, replayed responses, and callbacks that outlive their
//! welcome. Each must be rejected or ignored without running application
//! code.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        echo, reply, settle, Embedding, Recorder, FOREIGN_ORIGIN, GADGET_ID, TOKEN,
    };
    use parking_lot::Mutex;
    use rpc_host::{Capabilities, Window, ANY_ORIGIN};
    use rpc_router::RpcConfigBuilder;
    use rpc_types::{encode_json, ConfigurationFault, Envelope, RpcError, CALLBACK_SERVICE};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const EVIL_ORIGIN: &str = "http://evil.test";

    /// Post `envelope` into `window` as if some other context sent it.
    fn inject(window: &Window, envelope: &Envelope) {
        let data = encode_json(envelope).unwrap();
        assert!(window.post_message(data, ANY_ORIGIN, EVIL_ORIGIN));
    }

    fn forged(service: &str, from: &str, token: Option<&str>, args: Vec<Value>) -> Envelope {
        Envelope::builder(service, from)
            .args(args)
            .auth_token(token.map(str::to_string))
            .build()
    }

    // =============================================================================
    // AUTH TOKENS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_forged_calls_never_reach_container_handlers() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let gadget = page.attach_gadget();
        let transfers = Recorder::new();
        page.container
            .register("transfer", transfers.handler(|_| None))
            .unwrap();
        settle().await;

        inject(
            &page.top,
            &forged("transfer", GADGET_ID, Some("guess"), vec![json!(100)]),
        );
        inject(&page.top, &forged("transfer", GADGET_ID, None, vec![json!(100)]));
        settle().await;

        assert!(transfers.calls().is_empty());
        assert_eq!(page.container.metrics().auth_faults, 2);

        gadget.call("..", "transfer", None, vec![json!(1)]);
        assert_eq!(
            transfers.wait_for(1).await,
            vec![json!(["transfer", GADGET_ID, 0, [1]])]
        );
        assert_eq!(page.container.metrics().auth_faults, 2);
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forged_calls_never_reach_gadget_handlers() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget.register("navigate", recorder.handler(|_| None)).unwrap();
        settle().await;

        inject(
            &page.child,
            &forged("navigate", "..", Some("guess"), vec![json!("http://evil.test")]),
        );
        settle().await;
        assert!(recorder.calls().is_empty());
        assert_eq!(gadget.metrics().auth_faults, 1);

        // The real container still gets through.
        page.container
            .call(GADGET_ID, "navigate", None, vec![json!("/home")]);
        recorder.wait_for(1).await;
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forged_ack_cannot_confirm_an_endpoint() {
        let page = Embedding::new(Capabilities::fragment_only(), FOREIGN_ORIGIN);
        let pending = page.container.request(GADGET_ID, "echo", vec![json!(1)]);

        // A fragment navigation on the container's origin, without the token.
        let ack = forged("__ack", GADGET_ID, None, vec![]);
        let fragment = rpc_types::encode_fragments("..", GADGET_ID, 1, &ack, 2000)
            .unwrap()
            .remove(0);
        assert!(page
            .top
            .navigate_relay(&format!("http://container.test/relay.html#{fragment}")));
        settle().await;

        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert!(!status.confirmed);
        assert_eq!(status.queued, 1);
        assert_eq!(page.container.metrics().auth_faults, 1);

        let gadget = page.attach_gadget();
        gadget.register("echo", echo()).unwrap();
        assert_eq!(reply(pending).await, json!(1));
        page.shutdown(&gadget);
    }

    // =============================================================================
    // CALLBACKS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_replayed_response_fires_callback_once() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let gadget = page.attach_gadget();
        gadget.register("echo", echo()).unwrap();

        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let id = page.container.call(
            GADGET_ID,
            "echo",
            Some(Box::new(move |value| sink.lock().push(value))),
            vec![json!("genuine")],
        );
        settle().await;
        assert_eq!(*results.lock(), vec![json!("genuine")]);

        // A captured response, token and all, played back.
        inject(
            &page.top,
            &forged(CALLBACK_SERVICE, GADGET_ID, Some(TOKEN), vec![json!(id), json!("replayed")]),
        );
        settle().await;

        assert_eq!(*results.lock(), vec![json!("genuine")]);
        let metrics = page.container.metrics();
        assert_eq!(metrics.callbacks_fired, 1);
        assert_eq!(metrics.callbacks_ignored, 1);
        assert_eq!(metrics.auth_faults, 0);
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_callbacks_expire() {
        let config = RpcConfigBuilder::new()
            .setup_retry_interval_ms(20)
            .callback_ttl_ms(200)
            .build()
            .unwrap();
        let page = Embedding::with(
            Capabilities::all(),
            Capabilities::all(),
            FOREIGN_ORIGIN,
            config,
        );
        let gadget = page.attach_gadget();

        let pending = page.container.request(GADGET_ID, "missing", vec![]);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(pending.await.is_err());
        assert_eq!(page.container.pending_callbacks(), 0);
        assert_eq!(page.container.metrics().callbacks_evicted, 1);
        assert_eq!(gadget.metrics().unknown_services, 1);
        page.shutdown(&gadget);
    }

    // =============================================================================
    // SERVICE TABLE
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_reserved_names_and_default_handler() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let gadget = page.attach_gadget();

        for router in [&page.container, &gadget] {
            for name in [CALLBACK_SERVICE, "__ack", ""] {
                assert_eq!(
                    router.register(name, echo()),
                    Err(RpcError::Configuration(ConfigurationFault::ReservedService {
                        name: name.to_string()
                    }))
                );
            }
        }

        let fallback = Recorder::new();
        gadget.register_default(fallback.handler(|_| Some(json!("fallback"))));
        gadget.register("named", echo()).unwrap();

        let named = page.container.request(GADGET_ID, "named", vec![json!("own")]);
        let other = page.container.request(GADGET_ID, "anything", vec![]);
        assert_eq!(reply(named).await, json!("own"));
        assert_eq!(reply(other).await, json!("fallback"));
        assert_eq!(fallback.calls(), vec![json!(["anything", "..", 2, []])]);

        gadget.unregister_default();
        page.container.call(GADGET_ID, "anything", None, vec![]);
        settle().await;
        assert_eq!(fallback.calls().len(), 1);
        assert_eq!(gadget.metrics().unknown_services, 1);
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_gadget_ignores_traffic() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget.register("log", recorder.handler(|_| None)).unwrap();
        page.container.call(GADGET_ID, "log", None, vec![json!("before")]);
        recorder.wait_for(1).await;

        gadget.shutdown();
        let processed = gadget.metrics().processed;
        page.container.call(GADGET_ID, "log", None, vec![json!("after")]);
        settle().await;

        assert_eq!(recorder.calls().len(), 1);
        assert_eq!(gadget.metrics().processed, processed);
        page.container.shutdown();
    }
}
