//! Core error types.

use thiserror::Error;

/// Registration errors.
///
/// Dispatch and delivery have no error channel: a message nobody listens to is
/// reported as [`DispatchStatus::Unrouted`](crate::DispatchStatus::Unrouted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The registry has not completed initialization.
    #[error("registry not ready")]
    NotReady,

    /// The listener record is incomplete or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;
