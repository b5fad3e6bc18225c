//! Host environment errors.

use thiserror::Error;

/// Failures creating or wiring execution contexts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Contexts need a tokio runtime to run their event loop.
    #[error("No tokio runtime available for the event loop of {name:?}")]
    NoRuntime { name: String },

    /// A child with this id is already registered.
    #[error("Child context {id:?} already exists")]
    DuplicateChild { id: String },
}
