//! # RPC Router Crate
//!
//! Per-context message router for gadget RPC: a container page and the
//! gadget frames embedded in it call named services on each other over
//! whichever signaling primitive their host supports.
//!
//! ## Architecture
//!
//! ```text
//!        application
//!   register / call / request
//!             │
//!   ┌─────────▼──────────┐     ┌─────────────────────────┐
//!   │ service::Router    │────►│ domain                  │
//!   │  outbound + inbound│     │  endpoints, handshake,  │
//!   └─────────┬──────────┘     │  early queue, callbacks │
//!             │                └─────────────────────────┘
//!   ┌─────────▼──────────┐
//!   │ ports::Transport   │
//!   └─────────┬──────────┘
//!   ┌─────────▼─────────────────────────────┐
//!   │ adapters: wpm nix rmr fe ifpc noop    │
//!   └─────────┬─────────────────────────────┘
//!             ▼
//!      rpc_host::Window primitives
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use rpc_host::{Capabilities, Window};
//! use rpc_router::{RpcConfig, Router};
//! use serde_json::json;
//!
//! let top = Window::root("top", "http://a.com/container.html", Capabilities::all())?;
//! let frame = top.open_child("g1", "http://b.com/g1.html#rpctoken=abc", Capabilities::all())?;
//!
//! let container = Router::new(top, RpcConfig::default())?;
//! container.setup_receiver("g1", None, None)?;
//! let answer = container.request("g1", "echo", vec![json!("hi")]);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use config::{GadgetRpcConfig, RpcConfig, RpcConfigBuilder};
pub use domain::{generate_auth_token, EndpointStatus, SameDomainProbe, SetupState};
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use ports::{CallContext, Callback, Responder, ServiceHandler, Transport, TransportCode};
pub use service::Router;
