//! The secret vault.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};
use crate::secret::{Secret, SecretKind, SshCredential, UserPass};
use crate::store::SecretStore;

/// Replacement for redacted secret values.
pub const REDACTED: &str = "***";

enum KeyDir {
    /// Private temp directory, removed with the vault.
    Temp(tempfile::TempDir),
    /// Caller-provided directory; only the files we wrote are removed.
    Fixed(PathBuf),
}

impl KeyDir {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Holds every secret of a host for its whole lifetime.
///
/// Getters return clones scoped to one call. SSH private keys that a child
/// process or library needs as a file are written once into the vault's key
/// directory with owner-only permissions and removed when the vault drops.
pub struct SecretVault {
    secrets: HashMap<String, Secret>,
    redactions: Vec<Zeroizing<String>>,
    key_dir: KeyDir,
    key_files: DashMap<String, PathBuf>,
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVault")
            .field("secrets", &self.secrets.len())
            .field("key_dir", &self.key_dir.path())
            .finish_non_exhaustive()
    }
}

impl SecretVault {
    /// A vault with no secrets.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDir`] if the key directory cannot be created.
    pub fn empty() -> VaultResult<Self> {
        Self::from_entries(Vec::new(), None)
    }

    /// Build a vault from a store, using a private temp key directory.
    ///
    /// # Errors
    ///
    /// Propagates store errors; fails on duplicate ids across the store.
    pub fn from_store(store: &dyn SecretStore) -> VaultResult<Self> {
        Self::from_store_with_key_dir(store, None)
    }

    /// Build a vault from a store, materialising key files under `key_dir`
    /// when given.
    ///
    /// # Errors
    ///
    /// Propagates store errors and key directory creation failures.
    pub fn from_store_with_key_dir(
        store: &dyn SecretStore,
        key_dir: Option<&Path>,
    ) -> VaultResult<Self> {
        let entries = store.load()?;
        info!(backend = store.name(), count = entries.len(), "loaded secrets");
        Self::from_entries(entries, key_dir)
    }

    fn from_entries(entries: Vec<(String, Secret)>, key_dir: Option<&Path>) -> VaultResult<Self> {
        let key_dir = match key_dir {
            Some(path) => {
                std::fs::create_dir_all(path).map_err(|source| VaultError::KeyDir {
                    path: path.to_path_buf(),
                    source,
                })?;
                KeyDir::Fixed(path.to_path_buf())
            },
            None => KeyDir::Temp(
                tempfile::Builder::new()
                    .prefix("banai-keys-")
                    .tempdir()
                    .map_err(|source| VaultError::KeyDir {
                        path: std::env::temp_dir(),
                        source,
                    })?,
            ),
        };
        restrict_dir(key_dir.path());

        let mut secrets = HashMap::with_capacity(entries.len());
        for (id, secret) in entries {
            if secrets.contains_key(&id) {
                return Err(VaultError::DuplicateId(id));
            }
            secrets.insert(id, secret);
        }

        let mut redactions: Vec<Zeroizing<String>> = secrets
            .values()
            .flat_map(Secret::sensitive_values)
            .map(|v| Zeroizing::new(v.to_owned()))
            .collect();
        // Longest first so a value containing another is replaced whole.
        redactions.sort_by_key(|v| std::cmp::Reverse(v.len()));
        redactions.dedup();

        Ok(Self {
            secrets,
            redactions,
            key_dir,
            key_files: DashMap::new(),
        })
    }

    /// Number of secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether the vault is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Sorted ids of all secrets.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.secrets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Fetch any secret.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown id.
    pub fn get(&self, id: &str) -> VaultResult<Secret> {
        self.secrets
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(id.to_owned()))
    }

    /// Fetch a text secret.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] or [`VaultError::TypeMismatch`].
    pub fn get_text(&self, id: &str) -> VaultResult<Zeroizing<String>> {
        match self.get(id)? {
            Secret::Text(text) => Ok(text),
            other => Err(mismatch(id, SecretKind::Text, &other)),
        }
    }

    /// Fetch an SSH credential.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] or [`VaultError::TypeMismatch`].
    pub fn get_ssh(&self, id: &str) -> VaultResult<SshCredential> {
        match self.get(id)? {
            Secret::Ssh(ssh) => Ok(ssh),
            other => Err(mismatch(id, SecretKind::Ssh, &other)),
        }
    }

    /// Fetch a username/password credential.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] or [`VaultError::TypeMismatch`].
    pub fn get_user_pass(&self, id: &str) -> VaultResult<UserPass> {
        match self.get(id)? {
            Secret::UserPass(up) => Ok(up),
            other => Err(mismatch(id, SecretKind::UserPass, &other)),
        }
    }

    /// Path of the private key of SSH secret `id`, written on first use.
    ///
    /// The file is created with mode `0600` and reused by later calls.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`], [`VaultError::TypeMismatch`], or
    /// [`VaultError::KeyFile`] if the file cannot be written.
    pub fn key_file(&self, id: &str) -> VaultResult<PathBuf> {
        let ssh = self.get_ssh(id)?;
        let entry = self
            .key_files
            .entry(id.to_owned())
            .or_try_insert_with(|| self.write_key_file(id, &ssh))?;
        Ok(entry.value().clone())
    }

    fn write_key_file(&self, id: &str, ssh: &SshCredential) -> VaultResult<PathBuf> {
        let key_err = |source| VaultError::KeyFile {
            id: id.to_owned(),
            source,
        };
        let dir = self.key_dir.path();
        let target = dir.join(format!("{}.key", hex::encode(id)));

        // NamedTempFile is created 0600 on Unix.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(key_err)?;
        tmp.write_all(ssh.private_key.as_bytes()).map_err(key_err)?;
        if !ssh.private_key.ends_with('\n') {
            tmp.write_all(b"\n").map_err(key_err)?;
        }
        tmp.as_file().sync_all().map_err(key_err)?;
        tmp.persist(&target).map_err(|e| key_err(e.error))?;

        debug!(secret_id = id, "materialised ssh key file");
        Ok(target)
    }

    /// Replace every stored secret value in `text` with `***`.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for value in &self.redactions {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), REDACTED);
            }
        }
        out
    }
}

impl Drop for SecretVault {
    fn drop(&mut self) {
        if let KeyDir::Fixed(_) = self.key_dir {
            for entry in &self.key_files {
                if let Err(e) = std::fs::remove_file(entry.value()) {
                    warn!(error = %e, "failed to remove key file");
                }
            }
        }
    }
}

fn mismatch(id: &str, expected: SecretKind, actual: &Secret) -> VaultError {
    VaultError::TypeMismatch {
        id: id.to_owned(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(unix)]
fn restrict_dir(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)) {
        warn!(error = %e, "failed to restrict key directory permissions");
    }
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) {}
