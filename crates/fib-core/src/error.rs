//! Error handling for the identity bridge.
//!
//! Error messages are informative for operators while never carrying
//! personal data from identity assertions.

use thiserror::Error;

/// Result type alias using the bridge error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bridge bootstrap and configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A file referenced by configuration could not be read.
    #[error("cannot read {path}: {reason}")]
    FileRead {
        /// The path that was referenced.
        path: String,
        /// The underlying I/O failure.
        reason: String,
    },

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether this error must stop the process from serving traffic.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::FileRead { .. })
    }
}
