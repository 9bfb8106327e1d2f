//! Hashing error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while hashing content.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file to hash does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("cannot hash {}: not a regular file", .0.display())]
    NotAFile(PathBuf),

    /// Unknown algorithm name.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// I/O error while reading content.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// Path being read (empty for in-memory readers).
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for hashing operations.
pub type HashResult<T> = Result<T, HashError>;
