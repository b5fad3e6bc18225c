//! # Handshake State Machine
//!
//! ```text
//! [Pending] ──fail──→ [Retrying{n}] ──fail, n < max──→ [Retrying{n+1}]
//!     │                    │                                 │
//!     └──ok──→ [Established] ←──ok──┘           fail, n = max ─→ [Failed]
//! ```
//!
//! `Established` and `Failed` are terminal for setup attempts. A transport
//! can still report `on_ready(false)` after `Established`, which moves the
//! endpoint to `Failed`.

use serde::Serialize;
use std::time::Duration;

/// Setup progress of one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SetupState {
    /// No attempt made yet.
    #[default]
    Pending,
    /// `attempts` attempts failed; another is scheduled.
    Retrying { attempts: u32 },
    /// The transport accepted setup.
    Established,
    /// Setup gave up; the endpoint uses the noop transport.
    Failed,
}

impl SetupState {
    /// Terminal states reject relay address and token rewrites.
    #[must_use]
    pub fn is_sealed(self) -> bool {
        matches!(self, SetupState::Established | SetupState::Failed)
    }

    /// Failed attempts so far.
    #[must_use]
    pub fn attempts(self) -> u32 {
        match self {
            SetupState::Retrying { attempts } => attempts,
            _ => 0,
        }
    }
}

/// What to do after a setup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Send the ACK hello.
    Established,
    /// Try again after the delay.
    RetryAfter(Duration),
    /// Give up after this many attempts.
    Exhausted { attempts: u32 },
}

/// Retry budget for setup attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Advance `state` with the result of one attempt.
    pub fn after_attempt(&self, state: &mut SetupState, succeeded: bool) -> AttemptOutcome {
        if succeeded {
            *state = SetupState::Established;
            return AttemptOutcome::Established;
        }
        let attempts = state.attempts() + 1;
        if attempts < self.max_attempts {
            *state = SetupState::Retrying { attempts };
            AttemptOutcome::RetryAfter(self.interval)
        } else {
            *state = SetupState::Failed;
            AttemptOutcome::Exhausted { attempts }
        }
    }
}
