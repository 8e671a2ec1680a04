//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reading the previous run's state is fail-safe: a missing or corrupt state
/// results in a full rebuild rather than an error. This enum is used for
/// writes, for explicit snapshot loads, and for internal propagation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The persisted cache state could not be parsed.
    #[error("corrupt cache state '{key}': {reason}")]
    Corrupt {
        /// Store key of the unreadable state.
        key: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// A serialization error occurred while writing cache data.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A store key is empty, absolute, or escapes the store root.
    #[error("invalid cache key '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}
