//! # Router Configuration
//!
//! Tunables for the handshake, the early queue, the fragment transport and
//! the resize relay, plus the optional per-gadget settings a container
//! renders into its gadgets.
//!
//! # Example
//!
//! ```ignore
//! use rpc_router::config::RpcConfigBuilder;
//!
//! let config = RpcConfigBuilder::new()
//!     .setup_retry_interval_ms(250)
//!     .setup_max_attempts(4)
//!     .early_queueing(false)
//!     .build()?;
//! ```

use rpc_types::ConfigurationFault;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Smallest usable fragment chunk.
pub const MIN_FRAGMENT_LEN: usize = 8;

/// Router configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Delay between failed setup attempts.
    pub setup_retry_interval_ms: u64,
    /// Setup attempts before the endpoint degrades to the noop transport.
    pub setup_max_attempts: u32,
    /// Buffer calls to endpoints that have not confirmed yet.
    pub early_queueing: bool,
    /// Maximum encoded payload per address fragment.
    pub fragment_max_len: usize,
    /// Resize relay polling period, the fallback when resize signals are lost.
    pub relay_poll_interval_ms: u64,
    /// Evict callbacks that saw no response for this long. Off when `None`.
    pub callback_ttl_ms: Option<u64>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            setup_retry_interval_ms: 500,
            setup_max_attempts: 10,
            early_queueing: true,
            fragment_max_len: 2000,
            relay_poll_interval_ms: 50,
            callback_ttl_ms: None,
        }
    }
}

impl RpcConfig {
    /// Read overrides from the environment on top of the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `RPC_SETUP_RETRY_MS`: retry delay (default: 500)
    /// - `RPC_SETUP_MAX_ATTEMPTS`: setup attempts (default: 10)
    /// - `RPC_EARLY_QUEUEING`: `true`/`1` or `false`/`0` (default: true)
    /// - `RPC_FRAGMENT_MAX_LEN`: fragment chunk size (default: 2000)
    /// - `RPC_RELAY_POLL_MS`: resize relay poll period (default: 50)
    /// - `RPC_CALLBACK_TTL_MS`: callback eviction age (default: off)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            setup_retry_interval_ms: parse_env("RPC_SETUP_RETRY_MS")
                .unwrap_or(defaults.setup_retry_interval_ms),
            setup_max_attempts: parse_env("RPC_SETUP_MAX_ATTEMPTS")
                .unwrap_or(defaults.setup_max_attempts),
            early_queueing: env::var("RPC_EARLY_QUEUEING")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.early_queueing),
            fragment_max_len: parse_env("RPC_FRAGMENT_MAX_LEN")
                .unwrap_or(defaults.fragment_max_len),
            relay_poll_interval_ms: parse_env("RPC_RELAY_POLL_MS")
                .unwrap_or(defaults.relay_poll_interval_ms),
            callback_ttl_ms: parse_env("RPC_CALLBACK_TTL_MS").or(defaults.callback_ttl_ms),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigurationFault> {
        if self.setup_retry_interval_ms == 0 {
            return Err(ConfigurationFault::InvalidConfig(
                "setup_retry_interval_ms cannot be 0".to_string(),
            ));
        }
        if self.setup_max_attempts == 0 {
            return Err(ConfigurationFault::InvalidConfig(
                "setup_max_attempts cannot be 0".to_string(),
            ));
        }
        if self.fragment_max_len < MIN_FRAGMENT_LEN {
            return Err(ConfigurationFault::InvalidConfig(format!(
                "fragment_max_len must be at least {MIN_FRAGMENT_LEN}"
            )));
        }
        if self.relay_poll_interval_ms == 0 {
            return Err(ConfigurationFault::InvalidConfig(
                "relay_poll_interval_ms cannot be 0".to_string(),
            ));
        }
        if self.callback_ttl_ms == Some(0) {
            return Err(ConfigurationFault::InvalidConfig(
                "callback_ttl_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn setup_retry_interval(&self) -> Duration {
        Duration::from_millis(self.setup_retry_interval_ms)
    }

    #[must_use]
    pub fn relay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay_poll_interval_ms)
    }

    #[must_use]
    pub fn callback_ttl(&self) -> Option<Duration> {
        self.callback_ttl_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse `true`/`1`/`false`/`0`, case-insensitive.
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Builder for [`RpcConfig`] with validation.
#[derive(Default)]
pub struct RpcConfigBuilder {
    setup_retry_interval_ms: Option<u64>,
    setup_max_attempts: Option<u32>,
    early_queueing: Option<bool>,
    fragment_max_len: Option<usize>,
    relay_poll_interval_ms: Option<u64>,
    callback_ttl_ms: Option<u64>,
}

impl RpcConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_retry_interval_ms(mut self, ms: u64) -> Self {
        self.setup_retry_interval_ms = Some(ms);
        self
    }

    pub fn setup_max_attempts(mut self, attempts: u32) -> Self {
        self.setup_max_attempts = Some(attempts);
        self
    }

    pub fn early_queueing(mut self, enabled: bool) -> Self {
        self.early_queueing = Some(enabled);
        self
    }

    pub fn fragment_max_len(mut self, len: usize) -> Self {
        self.fragment_max_len = Some(len);
        self
    }

    pub fn relay_poll_interval_ms(mut self, ms: u64) -> Self {
        self.relay_poll_interval_ms = Some(ms);
        self
    }

    /// Enable callback eviction after `ms` without a response.
    pub fn callback_ttl_ms(mut self, ms: u64) -> Self {
        self.callback_ttl_ms = Some(ms);
        self
    }

    /// Build the config, validating all parameters.
    pub fn build(self) -> Result<RpcConfig, ConfigurationFault> {
        let defaults = RpcConfig::default();
        let config = RpcConfig {
            setup_retry_interval_ms: self
                .setup_retry_interval_ms
                .unwrap_or(defaults.setup_retry_interval_ms),
            setup_max_attempts: self.setup_max_attempts.unwrap_or(defaults.setup_max_attempts),
            early_queueing: self.early_queueing.unwrap_or(defaults.early_queueing),
            fragment_max_len: self.fragment_max_len.unwrap_or(defaults.fragment_max_len),
            relay_poll_interval_ms: self
                .relay_poll_interval_ms
                .unwrap_or(defaults.relay_poll_interval_ms),
            callback_ttl_ms: self.callback_ttl_ms.or(defaults.callback_ttl_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Settings a container renders into a gadget's configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GadgetRpcConfig {
    /// Relay address of the container. Relative values are resolved against
    /// the gadget's `parent` parameter.
    pub parent_relay_url: String,
    /// Talk to the container in the legacy fragment format.
    #[serde(default)]
    pub use_legacy_protocol: bool,
}

impl GadgetRpcConfig {
    #[must_use]
    pub fn new(parent_relay_url: impl Into<String>) -> Self {
        Self {
            parent_relay_url: parent_relay_url.into(),
            use_legacy_protocol: false,
        }
    }

    #[must_use]
    pub fn with_legacy_protocol(mut self, legacy: bool) -> Self {
        self.use_legacy_protocol = legacy;
        self
    }
}
