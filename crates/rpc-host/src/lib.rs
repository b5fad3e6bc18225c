//! # RPC Host Crate
//!
//! An in-process model of the environment gadget RPC runs in: a tree of
//! execution contexts (a container and the gadget frames it embeds), each
//! with its own event loop, plus the signaling primitives transports build
//! on.
//!
//! ## Primitives
//!
//! | Primitive | Where it lives | Used by |
//! |-----------|----------------|---------|
//! | message channel | [`Window::post_message`] | `wpm` |
//! | bridge object | [`Window::expose_bridge`] | `nix` |
//! | relay resources | [`Window::relay_resource`] | `rmr` |
//! | frame-element slots | [`Window::frame_element`] | `fe` |
//! | relay navigation | [`Window::navigate_relay`] | `ifpc` |
//! | direct hand-off | [`Signal::SameDomain`] | same-domain path |
//!
//! ## Concurrency
//!
//! Every inbound signal goes through the receiving window's queue, so
//! listeners of one window never run concurrently and never run inside the
//! sender's call stack.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod capabilities;
pub mod errors;
pub mod primitives;
pub mod signal;
pub mod window;

pub use capabilities::Capabilities;
pub use errors::HostError;
pub use primitives::{Bridge, FrameElement, RelayResource};
pub use signal::Signal;
pub use window::{Listener, ListenerId, Window, ANY_ORIGIN};
