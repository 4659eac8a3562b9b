//! Error types for memolru

use std::io;

use thiserror::Error;

/// Result type alias for memolru operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cache itself.
///
/// Failures of a wrapped computation are never represented here; they reach
/// the caller as the computation's own error value.
#[derive(Debug, Error)]
pub enum Error {
    /// Capacity is zero, or a configuration document is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An argument has no stable equality/hash contract
    #[error("Unhashable argument {argument}: values of type '{kind}' cannot be fingerprinted")]
    UnhashableArgument {
        /// Position (`#0`) or keyword name (`x=`) of the offending argument
        argument: String,
        /// Type name of the rejected value
        kind: &'static str,
    },

    /// I/O error while loading configuration
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error while loading configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfiguration`]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Returns true if this is an [`Error::UnhashableArgument`]
    pub fn is_unhashable(&self) -> bool {
        matches!(self, Error::UnhashableArgument { .. })
    }
}
