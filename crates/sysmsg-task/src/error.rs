//! Processing context error types.

use thiserror::Error;

/// Processing context errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The message queue has no free slot.
    #[error("message queue full")]
    QueueFull,

    /// The processing thread has stopped.
    #[error("processing context stopped")]
    Closed,

    /// The processing thread could not be created.
    #[error("failed to spawn processing thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Registration error.
    #[error("registry error: {0}")]
    Registry(#[from] sysmsg_core::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed shell command.
    #[error("invalid command: {0}")]
    Command(String),
}

/// Result alias for processing context operations.
pub type Result<T> = std::result::Result<T, Error>;
