//! # Handshake Flows
//!
//! Calls made before a peer is listening are held in the early queue and
//! replayed, in call order, once the ACK exchange (or the transport's own
//! readiness report) confirms the endpoint. An endpoint whose setup never
//! succeeds degrades to noop and its queue drains into the log.
//!
//! ```text
//! container                         gadget
//!    │ call ping, log s1, log s2       │
//!    │   (queued: not confirmed)       │
//!    │◄──────────── ACK hello ─────────│ router attached
//!    │ confirm g1, drain queue         │
//!    │──── ping, s1, s2 ──────────────►│
//!    │──── ACK reply ─────────────────►│ confirm ".."
//!    │◄──── __cb [1, 43] ──────────────│
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        fast_config, gadget_url, reply, settle, Embedding, Recorder, CONTAINER_URL,
        FOREIGN_ORIGIN, GADGET_ID, TOKEN,
    };
    use rpc_host::{Capabilities, Window};
    use rpc_router::{RpcConfigBuilder, Router, SetupState, TransportCode};
    use rpc_types::origin::percent_encode;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn plus_one(args: &[Value]) -> Option<Value> {
        Some(json!(args.first().and_then(Value::as_i64).unwrap_or(0) + 1))
    }

    /// Queue three calls before the gadget listens, then attach it and check
    /// they arrive in call order with the expected wire fields.
    async fn early_calls_drain_in_order(capabilities: Capabilities, expected: TransportCode) {
        let page = Embedding::new(capabilities, FOREIGN_ORIGIN);
        let pending = page.container.request(GADGET_ID, "ping", vec![json!(42)]);
        page.container.call(GADGET_ID, "log", None, vec![json!("s1")]);
        page.container.call(GADGET_ID, "log", None, vec![json!("s2")]);

        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert_eq!(status.queued, 3);
        assert!(!status.confirmed);

        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget.register("ping", recorder.handler(plus_one)).unwrap();
        gadget.register("log", recorder.handler(|_| None)).unwrap();

        assert_eq!(reply(pending).await, json!(43));
        assert_eq!(
            recorder.wait_for(3).await,
            vec![
                json!(["ping", "..", 1, [42]]),
                json!(["log", "..", 0, ["s1"]]),
                json!(["log", "..", 0, ["s2"]]),
            ]
        );

        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert!(status.confirmed);
        assert_eq!(status.queued, 0);
        assert_eq!(status.setup, SetupState::Established);
        assert_eq!(status.transport, Some(expected));
        assert_eq!(page.container.metrics().drained, 3);

        settle().await;
        let parent = gadget.endpoint_status("..").unwrap();
        assert!(parent.confirmed);
        assert_eq!(parent.transport, Some(expected));
        page.shutdown(&gadget);
    }

    // =============================================================================
    // EARLY QUEUE
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_early_calls_drain_in_order_over_wpm() {
        early_calls_drain_in_order(Capabilities::all(), TransportCode::PostMessage).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_calls_drain_in_order_over_nix() {
        early_calls_drain_in_order(Capabilities::bridge_only(), TransportCode::Bridge).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_calls_drain_in_order_over_rmr() {
        early_calls_drain_in_order(
            Capabilities::resize_relay_only(),
            TransportCode::ResizeRelay,
        )
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_calls_drain_in_order_over_fe() {
        early_calls_drain_in_order(
            Capabilities::frame_element_only(),
            TransportCode::FrameElement,
        )
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_calls_drain_in_order_over_ifpc() {
        early_calls_drain_in_order(Capabilities::fragment_only(), TransportCode::Fragment).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_gadget_calls_to_parent_drain_in_order() {
        let page = Embedding::new(Capabilities::all(), FOREIGN_ORIGIN);
        let recorder = Recorder::new();
        page.container
            .register("log", recorder.handler(|_| None))
            .unwrap();

        let gadget = page.attach_gadget();
        // Both spellings of the parent address the same endpoint.
        gadget.call("", "log", None, vec![json!("s1")]);
        gadget.call("..", "log", None, vec![json!("s2")]);
        assert_eq!(gadget.endpoint_status("..").unwrap().queued, 2);

        assert_eq!(
            recorder.wait_for(2).await,
            vec![
                json!(["log", GADGET_ID, 0, ["s1"]]),
                json!(["log", GADGET_ID, 0, ["s2"]]),
            ]
        );
        assert_eq!(gadget.metrics().drained, 2);
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_param_sends_before_confirmation() {
        let top = Window::root("top", CONTAINER_URL, Capabilities::all()).unwrap();
        let url = format!(
            "{FOREIGN_ORIGIN}/gadget.html?parent={}&rpc_earlyq=0#rpctoken={TOKEN}",
            percent_encode(CONTAINER_URL)
        );
        let child = top.open_child(GADGET_ID, url, Capabilities::all()).unwrap();
        let container = Router::new(Arc::clone(&top), fast_config()).unwrap();
        container.setup_receiver(GADGET_ID, None, None).unwrap();
        let recorder = Recorder::new();
        container
            .register("log", recorder.handler(|_| None))
            .unwrap();

        let gadget = Router::new(child, fast_config()).unwrap();
        gadget.call("..", "log", None, vec![json!("direct")]);
        let metrics = gadget.metrics();
        assert_eq!(metrics.queued, 0);
        assert_eq!(metrics.sends, 2, "ACK hello plus the call");

        assert_eq!(
            recorder.wait_for(1).await,
            vec![json!(["log", GADGET_ID, 0, ["direct"]])]
        );
    }

    // =============================================================================
    // SETUP RETRIES AND DEGRADATION
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_setup_retries_until_gadget_attaches() {
        let page = Embedding::new(Capabilities::frame_element_only(), FOREIGN_ORIGIN);
        tokio::time::sleep(Duration::from_millis(70)).await;

        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert!(matches!(status.setup, SetupState::Retrying { .. }));
        assert!(page.container.metrics().setup_attempts >= 2);

        let gadget = page.attach_gadget();
        gadget
            .register("ping", |_: &rpc_router::CallContext, _: &[Value]| {
                Some(json!("pong"))
            })
            .unwrap();
        let pending = page.container.request(GADGET_ID, "ping", vec![]);
        assert_eq!(reply(pending).await, json!("pong"));

        settle().await;
        assert_eq!(
            page.container.endpoint_status(GADGET_ID).unwrap().setup,
            SetupState::Established
        );
        assert_eq!(
            gadget.endpoint_status("..").unwrap().setup,
            SetupState::Established
        );
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_gadget_degrades_to_noop() {
        let top = Window::root("top", CONTAINER_URL, Capabilities::frame_element_only()).unwrap();
        top.open_child(
            "child2",
            gadget_url(FOREIGN_ORIGIN, Some("t2")),
            Capabilities::frame_element_only(),
        )
        .unwrap();
        let config = RpcConfigBuilder::new()
            .setup_retry_interval_ms(20)
            .setup_max_attempts(3)
            .build()
            .unwrap();
        let container = Router::new(top, config).unwrap();
        container.setup_receiver("child2", None, None).unwrap();

        let pending = container.request("child2", "ping", vec![json!(1)]);
        container.call("child2", "log", None, vec![json!("s1")]);
        settle().await;

        let status = container.endpoint_status("child2").unwrap();
        assert_eq!(status.setup, SetupState::Failed);
        assert_eq!(status.transport, Some(TransportCode::Noop));
        assert!(status.confirmed);
        assert_eq!(status.queued, 0);

        let metrics = container.metrics();
        assert_eq!(metrics.setup_attempts, 3);
        assert_eq!(metrics.setup_exhausted, 1);
        assert_eq!(metrics.drained, 2);
        assert_eq!(metrics.sends, 2);
        assert_eq!(container.pending_callbacks(), 1);

        // Later calls skip the queue and go straight to noop.
        container.call("child2", "log", None, vec![json!("s2")]);
        let metrics = container.metrics();
        assert_eq!(metrics.queued, 2);
        assert_eq!(metrics.sends, 3);

        container.shutdown();
        assert!(pending.await.is_err());
    }
}
