//! # Same-Domain Delivery
//!
//! A peer on the caller's origin with a router attached is reached through
//! its event queue instead of a transport. Handlers and callers must not be
//! able to tell the two paths apart.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        reply, settle, Embedding, Recorder, FOREIGN_ORIGIN, GADGET_ID, SAME_ORIGIN,
    };
    use rpc_host::Capabilities;
    use rpc_router::{MetricsSnapshot, SameDomainProbe};
    use serde_json::{json, Value};

    struct Observed {
        calls: Vec<Value>,
        replies: Vec<Value>,
        container: MetricsSnapshot,
        gadget: MetricsSnapshot,
    }

    /// Attach the gadget, then run a fixed exchange and record what both
    /// sides saw.
    async fn exchange(origin: &str) -> Observed {
        let page = Embedding::new(Capabilities::all(), origin);
        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget
            .register(
                "ping",
                recorder.handler(|args| Some(json!(args[0].as_i64().unwrap_or(0) * 10))),
            )
            .unwrap();
        gadget.register("log", recorder.handler(|_| None)).unwrap();

        let first = page.container.request(GADGET_ID, "ping", vec![json!(1)]);
        page.container.call(GADGET_ID, "log", None, vec![json!("between")]);
        let second = page.container.request(GADGET_ID, "ping", vec![json!(2)]);
        let replies = vec![reply(first).await, reply(second).await];
        let calls = recorder.wait_for(3).await;

        settle().await;
        let observed = Observed {
            calls,
            replies,
            container: page.container.metrics(),
            gadget: gadget.metrics(),
        };
        page.shutdown(&gadget);
        observed
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_delivery_matches_transport_delivery() {
        let direct = exchange(SAME_ORIGIN).await;
        let relayed = exchange(FOREIGN_ORIGIN).await;

        assert_eq!(direct.calls, relayed.calls);
        assert_eq!(direct.replies, relayed.replies);
        assert_eq!(direct.replies, vec![json!(10), json!(20)]);
        assert_eq!(
            direct.calls,
            vec![
                json!(["ping", "..", 1, [1]]),
                json!(["log", "..", 0, ["between"]]),
                json!(["ping", "..", 3, [2]]),
            ]
        );

        assert_eq!(direct.container.same_domain_deliveries, 3);
        assert_eq!(direct.gadget.same_domain_deliveries, 2);
        assert_eq!(relayed.container.same_domain_deliveries, 0);
        assert_eq!(relayed.gadget.same_domain_deliveries, 0);
        assert_eq!(direct.container.callbacks_fired, relayed.container.callbacks_fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_bypasses_the_early_queue() {
        let page = Embedding::new(Capabilities::all(), SAME_ORIGIN);
        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget.register("log", recorder.handler(|_| None)).unwrap();

        page.container.call(GADGET_ID, "log", None, vec![json!("now")]);
        let status = page.container.endpoint_status(GADGET_ID).unwrap();
        assert!(!status.confirmed);
        assert_eq!(status.queued, 0);
        assert_eq!(status.same_domain, SameDomainProbe::Available);

        recorder.wait_for(1).await;
        page.shutdown(&gadget);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_before_gadget_router_uses_transport() {
        let page = Embedding::new(Capabilities::all(), SAME_ORIGIN);
        page.container.call(GADGET_ID, "log", None, vec![json!("early")]);
        assert_eq!(
            page.container.endpoint_status(GADGET_ID).unwrap().same_domain,
            SameDomainProbe::Unavailable
        );

        let gadget = page.attach_gadget();
        let recorder = Recorder::new();
        gadget.register("log", recorder.handler(|_| None)).unwrap();
        page.container.call(GADGET_ID, "log", None, vec![json!("late")]);

        assert_eq!(
            recorder.wait_for(2).await,
            vec![
                json!(["log", "..", 0, ["early"]]),
                json!(["log", "..", 0, ["late"]]),
            ]
        );
        // The probe result is kept for the endpoint's lifetime.
        assert_eq!(page.container.metrics().same_domain_deliveries, 0);
        page.shutdown(&gadget);
    }
}
