//! # RPC Sandbox
//!
//! One container page and two gadgets in a single process:
//!
//! ```text
//!               container (http://container.example)
//!              ┌──────────────┴───────────────┐
//!   g1: echo (gadgets.example)      g2: clock (container.example)
//!   foreign origin, wpm             same origin, direct delivery
//! ```
//!
//! The container hands each gadget a fresh auth token through its address,
//! calls one service on each, and g1 calls back into the container. The
//! counters of all three routers are printed as JSON at the end.

use anyhow::{Context, Result};
use rpc_host::{Capabilities, Window};
use rpc_router::{generate_auth_token, CallContext, Router, RpcConfig};
use rpc_telemetry::{init_logging, TelemetryConfig};
use rpc_types::percent_encode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CONTAINER_URL: &str = "http://container.example/index.html";
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::for_service("rpc-sandbox"))
        .context("Failed to initialize logging")?;
    let config = RpcConfig::from_env();

    let top = Window::root("container", CONTAINER_URL, Capabilities::all())?;
    let echo_frame = top.open_child(
        "g1",
        gadget_url("http://gadgets.example/echo.html"),
        Capabilities::all(),
    )?;
    let clock_frame = top.open_child(
        "g2",
        gadget_url("http://container.example/gadgets/clock.html"),
        Capabilities::all(),
    )?;

    let container = Router::new(Arc::clone(&top), config.clone())?;
    container.register("resize", |ctx: &CallContext, args: &[Value]| -> Option<Value> {
        let height = args.first().cloned().unwrap_or(Value::Null);
        info!(gadget = ctx.sender(), height = %height, "Gadget asked to resize");
        Some(json!("ok"))
    })?;
    container.setup_receiver("g1", None, None)?;
    container.setup_receiver("g2", None, None)?;

    let echo = Router::new(echo_frame, config.clone())?;
    echo.register("echo", |_: &CallContext, args: &[Value]| -> Option<Value> {
        Some(args.first().cloned().unwrap_or(Value::Null))
    })?;

    let clock = Router::new(clock_frame, config)?;
    clock.register("now", |ctx: &CallContext, _: &[Value]| -> Option<Value> {
        let responder = ctx.responder()?;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            responder.respond(json!({ "tick": 1 }));
        });
        None
    })?;

    let echoed = tokio::time::timeout(
        REPLY_TIMEOUT,
        container.request("g1", "echo", vec![json!("hello")]),
    )
    .await
    .context("echo timed out")?
    .context("echo callback dropped")?;
    info!(reply = %echoed, "g1 answered");

    let now = tokio::time::timeout(REPLY_TIMEOUT, container.request("g2", "now", vec![]))
        .await
        .context("now timed out")?
        .context("now callback dropped")?;
    info!(reply = %now, "g2 answered");

    let resized = tokio::time::timeout(REPLY_TIMEOUT, echo.request("..", "resize", vec![json!(480)]))
        .await
        .context("resize timed out")?
        .context("resize callback dropped")?;
    info!(reply = %resized, "Container answered g1");

    let report = json!({
        "container": {
            "metrics": container.metrics(),
            "g1": container.endpoint_status("g1"),
            "g2": container.endpoint_status("g2"),
        },
        "g1": echo.metrics(),
        "g2": clock.metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    for router in [&clock, &echo, &container] {
        router.shutdown();
    }
    Ok(())
}

/// Address of a gadget carrying the container's address and a fresh token.
fn gadget_url(base: &str) -> String {
    format!(
        "{base}?parent={}#rpctoken={}",
        percent_encode(CONTAINER_URL),
        generate_auth_token()
    )
}
