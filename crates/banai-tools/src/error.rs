//! Error taxonomy shared by every builtin.

use std::fmt;
use std::path::Path;

use banai_crypto::HashError;
use banai_vault::{SecretKind, SecretVault, VaultError};
use serde::{Serialize, Serializer};

use crate::envelope::ShellResult;

/// Script-facing error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed arguments or options.
    Config,
    /// Missing path, container or executable.
    NotFound,
    /// Deadline exceeded.
    Timeout,
    /// SSH transport or authentication failure.
    Connection,
    /// HTTP transport failure.
    Network,
    /// Unknown secret id.
    SecretNotFound,
    /// Secret stored under a different kind.
    SecretTypeMismatch,
    /// Archive entry would escape the destination.
    ArchiveSecurity,
    /// Non-recursive removal of a non-empty directory.
    DirNotEmpty,
    /// Target exists and overwriting is not the policy.
    AlreadyExists,
    /// A dependent service (container engine) is down.
    Unavailable,
    /// Any other I/O failure.
    Io,
}

impl ErrorKind {
    /// Name under which scripts catch this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "ConfigError",
            Self::NotFound => "NotFoundError",
            Self::Timeout => "TimeoutError",
            Self::Connection => "ConnectionError",
            Self::Network => "NetworkError",
            Self::SecretNotFound => "SecretNotFoundError",
            Self::SecretTypeMismatch => "SecretTypeMismatchError",
            Self::ArchiveSecurity => "ArchiveSecurityError",
            Self::DirNotEmpty => "DirNotEmptyError",
            Self::AlreadyExists => "AlreadyExistsError",
            Self::Unavailable => "UnavailableError",
            Self::Io => "IOError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Failure of one builtin call.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Malformed arguments or options.
    #[error("{0}")]
    Config(String),

    /// Something the call needs does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Deadline exceeded. Carries whatever output was captured.
    #[error("timed out after {seconds}s")]
    Timeout {
        /// Configured deadline.
        seconds: u64,
        /// Output captured before the deadline, for process and remote calls.
        partial: Option<Box<ShellResult>>,
    },

    /// SSH transport or authentication failure.
    #[error("cannot connect to {address}: {reason}")]
    Connection {
        /// `host:port` that was dialled.
        address: String,
        /// Transport message.
        reason: String,
    },

    /// HTTP transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Unknown secret id.
    #[error("secret '{0}' not found")]
    SecretNotFound(String),

    /// Secret of the wrong kind.
    #[error("secret '{id}' is a {actual} secret, expected {expected}")]
    SecretTypeMismatch {
        /// Secret id.
        id: String,
        /// Requested kind.
        expected: SecretKind,
        /// Stored kind.
        actual: SecretKind,
    },

    /// Archive entry escaping its destination.
    #[error("archive entry '{0}' escapes the destination")]
    ArchiveSecurity(String),

    /// Directory is not empty.
    #[error("directory not empty: {0}")]
    DirNotEmpty(String),

    /// Target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Dependent service unavailable.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        /// Service name.
        service: &'static str,
        /// Why.
        reason: String,
    },

    /// I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path or resource involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for builtin implementations.
pub type ToolResult<T> = Result<T, CapabilityError>;

impl CapabilityError {
    /// Build a [`CapabilityError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Build a [`CapabilityError::NotFound`] for a path.
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound(path.as_ref().display().to_string())
    }

    /// Classify an I/O error on `path`.
    ///
    /// `NotFound`, `AlreadyExists` and `DirectoryNotEmpty` map to their own
    /// kinds; everything else is [`ErrorKind::Io`].
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let shown = path.as_ref().display().to_string();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(shown),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(shown),
            std::io::ErrorKind::DirectoryNotEmpty => Self::DirNotEmpty(shown),
            _ => Self::Io {
                path: shown,
                source,
            },
        }
    }

    /// A background worker panicked or was cancelled.
    pub(crate) fn task(e: &tokio::task::JoinError) -> Self {
        Self::Io {
            path: "background task".to_owned(),
            source: std::io::Error::other(e.to_string()),
        }
    }

    /// Script-facing kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Network(_) => ErrorKind::Network,
            Self::SecretNotFound(_) => ErrorKind::SecretNotFound,
            Self::SecretTypeMismatch { .. } => ErrorKind::SecretTypeMismatch,
            Self::ArchiveSecurity(_) => ErrorKind::ArchiveSecurity,
            Self::DirNotEmpty(_) => ErrorKind::DirNotEmpty,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Output captured before a timeout.
    #[must_use]
    pub fn partial(&self) -> Option<&ShellResult> {
        match self {
            Self::Timeout {
                partial: Some(p), ..
            } => Some(&**p),
            _ => None,
        }
    }
}

impl From<VaultError> for CapabilityError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound(id) => Self::SecretNotFound(id),
            VaultError::TypeMismatch {
                id,
                expected,
                actual,
            } => Self::SecretTypeMismatch {
                id,
                expected,
                actual,
            },
            VaultError::KeyFile { id, source } => Self::Io {
                path: format!("key file for secret '{id}'"),
                source,
            },
            VaultError::KeyDir { path, source } | VaultError::Read { path, source } => Self::Io {
                path: path.display().to_string(),
                source,
            },
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<HashError> for CapabilityError {
    fn from(e: HashError) -> Self {
        match e {
            HashError::NotFound(path) => Self::not_found(path),
            HashError::Io { path, source } => Self::io(path, source),
            other => Self::Config(other.to_string()),
        }
    }
}

/// What the evaluator turns into a catchable script exception.
///
/// The message and any partial output have already been redacted.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptException {
    /// Kind name, e.g. `NotFoundError`.
    pub kind: ErrorKind,
    /// Human-readable, redacted message.
    pub message: String,
    /// Partial process output for timeouts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<ShellResult>,
}

impl ScriptException {
    /// Convert a capability error, scrubbing secret values with `vault`.
    #[must_use]
    pub fn from_error(error: &CapabilityError, vault: &SecretVault) -> Self {
        Self {
            kind: error.kind(),
            message: vault.redact(&error.to_string()),
            partial: error.partial().map(|p| ShellResult {
                out: vault.redact(&p.out),
                err: vault.redact(&p.err),
                status: p.status,
            }),
        }
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ScriptException {}

#[cfg(test)]
mod tests {
    use super::*;
    use banai_vault::{MemorySecretStore, Secret};

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::Io.as_str(), "IOError");
        assert_eq!(ErrorKind::SecretTypeMismatch.to_string(), "SecretTypeMismatchError");
        assert_eq!(
            serde_json::to_value(ErrorKind::DirNotEmpty).unwrap(),
            serde_json::json!("DirNotEmptyError")
        );
    }

    #[test]
    fn test_io_classification() {
        let nf = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(CapabilityError::io("/x", nf).kind(), ErrorKind::NotFound);
        let ae = std::io::Error::from(std::io::ErrorKind::AlreadyExists);
        assert_eq!(CapabilityError::io("/x", ae).kind(), ErrorKind::AlreadyExists);
        let pd = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(CapabilityError::io("/x", pd).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_vault_error_mapping() {
        let e: CapabilityError = VaultError::NotFound("db".into()).into();
        assert_eq!(e.kind(), ErrorKind::SecretNotFound);
        let e: CapabilityError = VaultError::TypeMismatch {
            id: "db".into(),
            expected: SecretKind::Ssh,
            actual: SecretKind::Text,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::SecretTypeMismatch);
    }

    #[test]
    fn test_exception_redacts_message_and_partial() {
        let store = MemorySecretStore::new().with("pw", Secret::text("s3cr3t-value"));
        let vault = SecretVault::from_store(&store).unwrap();
        let err = CapabilityError::Timeout {
            seconds: 1,
            partial: Some(Box::new(ShellResult {
                out: "password=s3cr3t-value".into(),
                err: String::new(),
                status: -1,
            })),
        };
        let ex = ScriptException::from_error(&err, &vault);
        assert_eq!(ex.kind, ErrorKind::Timeout);
        assert_eq!(ex.partial.unwrap().out, "password=***");

        let err = CapabilityError::Connection {
            address: "h:22".into(),
            reason: "bad passphrase s3cr3t-value".into(),
        };
        let ex = ScriptException::from_error(&err, &vault);
        assert!(!ex.message.contains("s3cr3t-value"));
        assert_eq!(ex.to_string(), "ConnectionError: cannot connect to h:22: bad passphrase ***");
    }
}
