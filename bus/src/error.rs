//! Error types shared by the event bus and job queue.

use thiserror::Error;

/// Errors that can occur while interacting with the [`EventBus`](crate::eventbus::EventBus)
/// or [`JobQueue`](crate::jobqueue::JobQueue).
#[derive(Debug, Error)]
pub enum BusError {
    /// A channel or key name was malformed (empty, or otherwise unusable).
    #[error("invalid channel or key name: {0}")]
    InvalidName(String),

    /// The requested function has no registered worker.
    #[error("no worker registered for function '{0}'")]
    UnknownFunction(String),

    /// A value could not be serialized/deserialized across the bus boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus has been shut down and can no longer accept work.
    #[error("bus is shutting down")]
    ShuttingDown,
}

pub type BusResult<T> = Result<T, BusError>;
