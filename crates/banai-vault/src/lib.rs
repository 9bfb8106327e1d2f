//! Banai Vault - Typed secrets for the Banai script host.
//!
//! Secrets are loaded once from a [`SecretStore`] into a [`SecretVault`].
//! Scripts refer to them by id; the vault hands out per-call clones,
//! writes SSH keys to owner-only files when a process needs a path, and
//! scrubs secret values out of any text with [`SecretVault::redact`].
//!
//! ```
//! use banai_vault::{MemorySecretStore, Secret, SecretVault};
//!
//! let store = MemorySecretStore::new().with("token", Secret::text("s3cr3t"));
//! let vault = SecretVault::from_store(&store).unwrap();
//! assert_eq!(vault.redact("token=s3cr3t"), "token=***");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod secret;
mod store;
mod vault;

pub use error::{VaultError, VaultResult};
pub use secret::{Secret, SecretKind, SshCredential, UserPass};
pub use store::{JsonFileSecretStore, MemorySecretStore, SecretStore};
pub use vault::{REDACTED, SecretVault};
pub use zeroize::Zeroizing;
