//! Session error types.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A session user violates its invariants.
    #[error("invalid session user: {0}")]
    InvalidUser(String),

    /// A session with the same id already exists.
    #[error("session already exists")]
    Conflict,

    /// Storage error.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Checks if this is a storage failure rather than bad input.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
