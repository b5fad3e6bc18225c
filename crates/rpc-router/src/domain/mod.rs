//! # Domain Layer
//!
//! Router state that does not touch a transport:
//!
//! - `endpoint`: per-peer record and its public snapshot
//! - `handshake`: setup state machine and retry budget
//! - `early_queue`: pre-confirmation buffer
//! - `call_registry`: callback id correlation
//! - `same_domain`: direct-delivery probe
//! - `scheduler`: cancellable timers driving retries and eviction
//! - `token`: auth token generation

pub mod call_registry;
pub mod early_queue;
pub mod endpoint;
pub mod handshake;
pub mod same_domain;
pub mod scheduler;
pub mod token;

pub use call_registry::CallRegistry;
pub use early_queue::EarlyQueue;
pub use endpoint::{Endpoint, EndpointStatus};
pub use handshake::{AttemptOutcome, RetryPolicy, SetupState};
pub use same_domain::SameDomainProbe;
pub use scheduler::ScheduledTask;
pub use token::{generate_auth_token, generate_auth_token_of_len, AUTH_TOKEN_LEN};
