//! # Transport Round Trips
//!
//! The same container/gadget exchange run over each signaling strategy the
//! capability probe can pick, plus the chunked and legacy fragment paths.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        echo, fast_config, gadget_url, reply, settle, Embedding, Recorder, CONTAINER_URL,
        FOREIGN_ORIGIN, GADGET_ID,
    };
    use rpc_host::{Capabilities, Window};
    use rpc_router::{
        CallContext, GadgetRpcConfig, RpcConfigBuilder, Router, ServiceHandler, TransportCode,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Handler that answers from a spawned task after `delay`.
    fn deferred(delay: Duration) -> impl ServiceHandler {
        move |ctx: &CallContext, args: &[Value]| {
            let responder = ctx.responder()?;
            let value = json!({ "late": args });
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                responder.respond(value);
            });
            None
        }
    }

    /// Echo down, resize up, deferred answer down; both sides must agree on
    /// the channel.
    async fn round_trip(capabilities: Capabilities, expected: TransportCode) {
        let page = Embedding::new(capabilities, FOREIGN_ORIGIN);
        assert_eq!(page.container.relay_channel(), expected);

        let gadget = page.attach_gadget();
        gadget.register("echo", echo()).unwrap();
        gadget
            .register("slow", deferred(Duration::from_millis(30)))
            .unwrap();
        let resizes = Recorder::new();
        page.container
            .register("resize", resizes.handler(|_| Some(json!("ok"))))
            .unwrap();

        let payload = json!({ "k": [1, 2, 3], "s": "a&b=c#d%" });
        let echoed = page.container.request(GADGET_ID, "echo", vec![payload.clone()]);
        assert_eq!(reply(echoed).await, payload);

        // The gadget's answer to `echo` already took call id 1.
        let resized = gadget.request("..", "resize", vec![json!(480)]);
        assert_eq!(reply(resized).await, json!("ok"));
        assert_eq!(resizes.calls(), vec![json!(["resize", GADGET_ID, 2, [480]])]);

        let late = page.container.request(GADGET_ID, "slow", vec![json!(7)]);
        assert_eq!(reply(late).await, json!({ "late": [7] }));

        settle().await;
        assert_eq!(
            page.container.endpoint_status(GADGET_ID).unwrap().transport,
            Some(expected)
        );
        assert_eq!(gadget.endpoint_status("..").unwrap().transport, Some(expected));
        assert_eq!(page.container.pending_callbacks(), 0);
        assert_eq!(gadget.pending_callbacks(), 0);
        assert_eq!(page.container.metrics().auth_faults, 0);
        assert_eq!(gadget.metrics().auth_faults, 0);
        page.shutdown(&gadget);
    }

    // =============================================================================
    // ONE ROUND TRIP PER TRANSPORT
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_over_wpm() {
        round_trip(Capabilities::all(), TransportCode::PostMessage).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_over_nix() {
        round_trip(Capabilities::bridge_only(), TransportCode::Bridge).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_over_rmr() {
        round_trip(Capabilities::resize_relay_only(), TransportCode::ResizeRelay).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_over_fe() {
        round_trip(Capabilities::frame_element_only(), TransportCode::FrameElement).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_over_ifpc() {
        round_trip(Capabilities::fragment_only(), TransportCode::Fragment).await;
    }

    // =============================================================================
    // FRAGMENT SPECIFICS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_large_payload_is_chunked_and_reassembled() {
        let config = || {
            RpcConfigBuilder::new()
                .setup_retry_interval_ms(20)
                .fragment_max_len(64)
                .build()
                .unwrap()
        };
        let page = Embedding::with(
            Capabilities::fragment_only(),
            Capabilities::fragment_only(),
            FOREIGN_ORIGIN,
            config(),
        );
        let gadget = page.attach_gadget_with(config());
        gadget.register("echo", echo()).unwrap();

        let text = "chunk me ".repeat(200);
        let pending = page.container.request(GADGET_ID, "echo", vec![json!(text)]);
        assert_eq!(reply(pending).await, json!(text));
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_without_the_default_primitive_degrades_to_noop() {
        // The container probes wpm, but the gadget's host cannot receive it.
        let page = Embedding::with(
            Capabilities::all(),
            Capabilities::fragment_only(),
            FOREIGN_ORIGIN,
            fast_config(),
        );
        let gadget = page.attach_gadget();
        gadget.register("echo", echo()).unwrap();
        assert_eq!(gadget.relay_channel(), TransportCode::Fragment);

        let _pending = page.container.request(GADGET_ID, "echo", vec![json!("x")]);
        settle().await;

        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert_eq!(status.transport, Some(TransportCode::Noop));
        assert!(status.confirmed);
        let metrics = page.container.metrics();
        assert!(metrics.fallbacks >= 1);
        assert_eq!(page.container.pending_callbacks(), 1);
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_gadget_speaks_legacy_fragments() {
        let top = Window::root("top", CONTAINER_URL, Capabilities::all()).unwrap();
        let child = top
            .open_child(GADGET_ID, gadget_url(FOREIGN_ORIGIN, None), Capabilities::all())
            .unwrap();
        let container = Router::new(Arc::clone(&top), fast_config()).unwrap();
        container
            .set_relay_address(GADGET_ID, child.location(), true)
            .unwrap();
        container.set_auth_token(GADGET_ID, "").unwrap();

        let gadget = Router::with_gadget_config(
            Arc::clone(&child),
            fast_config(),
            GadgetRpcConfig::new("http://container.test/relay.html").with_legacy_protocol(true),
        )
        .unwrap();
        let notes = Recorder::new();
        gadget.register("note", notes.handler(|_| None)).unwrap();
        let resizes = Recorder::new();
        container
            .register("resize", resizes.handler(|_| None))
            .unwrap();

        assert_eq!(container.relay_channel(), TransportCode::PostMessage);
        assert_eq!(gadget.relay_channel(), TransportCode::Fragment);

        container.call(GADGET_ID, "note", None, vec![json!(7), json!("x")]);
        gadget.call("..", "resize", None, vec![json!(480)]);

        // Legacy fragments carry arguments as strings and no callback id.
        assert_eq!(
            notes.wait_for(1).await,
            vec![json!(["note", "..", 0, ["7", "x"]])]
        );
        assert_eq!(
            resizes.wait_for(1).await,
            vec![json!(["resize", GADGET_ID, 0, ["480"]])]
        );

        settle().await;
        let status = container.endpoint_status(GADGET_ID).unwrap();
        assert!(status.legacy);
        assert!(status.confirmed);
        assert_eq!(status.transport, Some(TransportCode::Fragment));
        assert!(gadget.endpoint_status("..").unwrap().confirmed);
    }
}
