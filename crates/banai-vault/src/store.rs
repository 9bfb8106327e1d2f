//! Secret store backends.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};
use crate::secret::{Secret, SshCredential, UserPass};

/// A source of secrets, read once when a vault is built.
///
/// Callers depend on this trait so further backends (OS keyring, remote
/// secret managers) can be added without touching the vault.
pub trait SecretStore: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Load every `(id, secret)` pair.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the backend is unreadable or malformed.
    fn load(&self) -> VaultResult<Vec<(String, Secret)>>;
}

/// In-memory store, mainly for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySecretStore {
    entries: Vec<(String, Secret)>,
}

impl MemorySecretStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, secret: Secret) -> Self {
        self.entries.push((id.into(), secret));
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> VaultResult<Vec<(String, Secret)>> {
        Ok(self.entries.clone())
    }
}

/// JSON secrets file.
///
/// ```json
/// {"secrets": [
///   {"id": "token", "type": "text", "text": "..."},
///   {"id": "deploy", "type": "ssh", "user": "ops", "privateKey": "...", "passphrase": ""},
///   {"id": "registry", "type": "userpass", "user": "ci", "password": "..."}
/// ]}
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileSecretStore {
    path: PathBuf,
}

impl JsonFileSecretStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
struct SecretsFile {
    #[serde(default)]
    secrets: Vec<RawSecret>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSecret {
    Text {
        id: String,
        text: String,
    },
    Ssh {
        id: String,
        #[serde(default)]
        user: String,
        #[serde(rename = "privateKey")]
        private_key: String,
        #[serde(default)]
        passphrase: String,
    },
    #[serde(rename = "userpass")]
    UserPass {
        id: String,
        user: String,
        password: String,
    },
}

impl RawSecret {
    fn into_entry(self) -> (String, Secret) {
        match self {
            Self::Text { id, text } => (id, Secret::Text(Zeroizing::new(text))),
            Self::Ssh {
                id,
                user,
                private_key,
                passphrase,
            } => (
                id,
                Secret::Ssh(SshCredential {
                    user,
                    private_key: Zeroizing::new(private_key),
                    passphrase: Zeroizing::new(passphrase),
                }),
            ),
            Self::UserPass { id, user, password } => (
                id,
                Secret::UserPass(UserPass {
                    username: user,
                    password: Zeroizing::new(password),
                }),
            ),
        }
    }
}

impl SecretStore for JsonFileSecretStore {
    fn name(&self) -> &str {
        "json-file"
    }

    fn load(&self) -> VaultResult<Vec<(String, Secret)>> {
        let content = Zeroizing::new(std::fs::read_to_string(&self.path).map_err(|source| {
            VaultError::Read {
                path: self.path.clone(),
                source,
            }
        })?);
        parse_secrets(&content, &self.path)
    }
}

pub(crate) fn parse_secrets(content: &str, path: &Path) -> VaultResult<Vec<(String, Secret)>> {
    let file: SecretsFile = serde_json::from_str(content).map_err(|e| VaultError::Parse {
        path: path.to_path_buf(),
        line: e.line(),
        column: e.column(),
    })?;

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(file.secrets.len());
    for (index, raw) in file.secrets.into_iter().enumerate() {
        let (id, secret) = raw.into_entry();
        if id.trim().is_empty() {
            return Err(VaultError::InvalidEntry {
                index,
                message: "id must not be empty".to_owned(),
            });
        }
        if let Secret::Ssh(ssh) = &secret
            && ssh.private_key.trim().is_empty()
        {
            return Err(VaultError::InvalidEntry {
                index,
                message: format!("ssh secret '{id}' has an empty privateKey"),
            });
        }
        if !seen.insert(id.clone()) {
            return Err(VaultError::DuplicateId(id));
        }
        entries.push((id, secret));
    }
    Ok(entries)
}
