//! # Gadget-RPC Test Suite
//!
//! End-to-end tests that wire a container and its gadgets together through
//! real routers and simulated host contexts.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── codec_benchmarks.rs   # Envelope and fragment codec throughput
//! └── src/integration/
//!     ├── harness.rs            # Embedding fixture, recorders, timeouts
//!     ├── handshake.rs          # Early queue, ACK exchange, degradation
//!     ├── transports.rs         # Round trips over every signaling strategy
//!     ├── same_domain.rs        # Direct delivery vs. transport delivery
//!     └── security.rs           # Token checks, replay, callback lifetime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rpc-tests
//!
//! # By area
//! cargo test -p rpc-tests integration::transports::
//!
//! # Benchmarks
//! cargo bench -p rpc-tests
//! ```

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod integration;
