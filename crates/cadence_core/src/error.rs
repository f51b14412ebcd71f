//! Scheduling error types

use thiserror::Error;

/// Errors raised by the scheduling core
#[derive(Error, Debug)]
pub enum SequenceError {
    /// A component was disposed twice
    #[error("{component} already disposed")]
    AlreadyDisposed { component: &'static str },

    /// A coroutine asked to wait on a label nobody defined
    #[error("unknown suspension label: {0}")]
    UnknownLabel(String),

    /// A coroutine body returned an error while being resumed
    #[error(transparent)]
    Task(#[from] anyhow::Error),
}

/// Result type for scheduling operations
pub type Result<T> = std::result::Result<T, SequenceError>;
