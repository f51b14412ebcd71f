//! Application error types

use cadence_animation::TweenError;
use cadence_core::SequenceError;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// A node or app was disposed twice
    #[error("{0} already disposed")]
    AlreadyDisposed(&'static str),

    /// A required value was not found in the node's context chain
    #[error("no `{0}` in context")]
    MissingContext(&'static str),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    /// A scheduling component failed, including coroutine task errors
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// A tween could not be created
    #[error(transparent)]
    Tween(#[from] TweenError),
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;
