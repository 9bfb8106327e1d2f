//! Vault error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::secret::SecretKind;

/// Errors raised by the secret vault.
///
/// No variant ever carries secret material.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No secret with this id.
    #[error("secret '{0}' not found")]
    NotFound(String),

    /// The secret exists but holds a different kind of value.
    #[error("secret '{id}' is a {actual} secret, expected {expected}")]
    TypeMismatch {
        /// Requested id.
        id: String,
        /// Kind the caller asked for.
        expected: SecretKind,
        /// Kind actually stored.
        actual: SecretKind,
    },

    /// The secrets file could not be read.
    #[error("failed to read secrets file {}: {source}", path.display())]
    Read {
        /// Secrets file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The secrets file is not valid. Only the position is reported.
    #[error("invalid secrets file {} at line {line}, column {column}", path.display())]
    Parse {
        /// Secrets file path.
        path: PathBuf,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
    },

    /// An entry is structurally valid JSON but unusable.
    #[error("invalid secret entry #{index}: {message}")]
    InvalidEntry {
        /// 0-based position in the `secrets` array.
        index: usize,
        /// What is wrong.
        message: String,
    },

    /// Two entries share an id.
    #[error("duplicate secret id '{0}'")]
    DuplicateId(String),

    /// The key directory could not be created.
    #[error("failed to prepare key directory {}: {source}", path.display())]
    KeyDir {
        /// Requested directory, empty for a temp directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A private key could not be written to the key directory.
    #[error("failed to materialise key file for secret '{id}': {source}")]
    KeyFile {
        /// Secret id.
        id: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
