//! # RPC Telemetry
//!
//! Logging setup shared by gadget RPC binaries. Libraries only emit
//! `tracing` events; a process calls [`init_logging`] once to decide where
//! they go.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpc_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RPC_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directives |
//! | `RPC_JSON_LOGS` | `false` | One JSON object per event |
//! | `RPC_SERVICE_NAME` | `gadget-rpc` | Name attached to the startup event |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter {directives:?}: {reason}")]
    Filter { directives: String, reason: String },

    #[error("Failed to install the global subscriber: {0}")]
    SubscriberInit(String),
}
