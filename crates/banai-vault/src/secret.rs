//! Secret value types.
//!
//! Sensitive fields are wrapped in [`Zeroizing`] so their buffers are wiped
//! when the last copy is dropped. `Debug` never prints them.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The three kinds of secret a vault can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretKind {
    /// Opaque text.
    Text,
    /// SSH private key with user and passphrase.
    Ssh,
    /// Username and password.
    #[serde(rename = "userpass")]
    UserPass,
}

impl SecretKind {
    /// Name used in the secrets file and in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Ssh => "ssh",
            Self::UserPass => "userpass",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH login material.
#[derive(Clone)]
pub struct SshCredential {
    /// Login user. May be empty, in which case the target supplies it.
    pub user: String,
    /// PEM/OpenSSH private key contents.
    pub private_key: Zeroizing<String>,
    /// Key passphrase, empty when the key is unencrypted.
    pub passphrase: Zeroizing<String>,
}

impl fmt::Debug for SshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredential")
            .field("user", &self.user)
            .field("private_key", &"***")
            .field("has_passphrase", &!self.passphrase.is_empty())
            .finish()
    }
}

/// Username/password pair.
#[derive(Clone)]
pub struct UserPass {
    /// Username.
    pub username: String,
    /// Password.
    pub password: Zeroizing<String>,
}

impl fmt::Debug for UserPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPass")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A stored secret.
#[derive(Clone)]
pub enum Secret {
    /// Opaque text value.
    Text(Zeroizing<String>),
    /// SSH key credential.
    Ssh(SshCredential),
    /// Username/password credential.
    UserPass(UserPass),
}

impl Secret {
    /// Build a text secret.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Zeroizing::new(value.into()))
    }

    /// Build an SSH secret.
    #[must_use]
    pub fn ssh(
        user: impl Into<String>,
        private_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self::Ssh(SshCredential {
            user: user.into(),
            private_key: Zeroizing::new(private_key.into()),
            passphrase: Zeroizing::new(passphrase.into()),
        })
    }

    /// Build a username/password secret.
    #[must_use]
    pub fn user_pass(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserPass(UserPass {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        })
    }

    /// Kind of this secret.
    #[must_use]
    pub const fn kind(&self) -> SecretKind {
        match self {
            Self::Text(_) => SecretKind::Text,
            Self::Ssh(_) => SecretKind::Ssh,
            Self::UserPass(_) => SecretKind::UserPass,
        }
    }

    /// The values that must never appear in output. Usernames are not
    /// included.
    pub(crate) fn sensitive_values(&self) -> Vec<&str> {
        let values: Vec<&str> = match self {
            Self::Text(text) => vec![text.as_str()],
            Self::Ssh(ssh) => vec![ssh.private_key.as_str(), ssh.passphrase.as_str()],
            Self::UserPass(up) => vec![up.password.as_str()],
        };
        values.into_iter().filter(|v| !v.is_empty()).collect()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(_) => f.write_str("Secret::Text(***)"),
            Self::Ssh(ssh) => write!(f, "Secret::Ssh({ssh:?})"),
            Self::UserPass(up) => write!(f, "Secret::UserPass({up:?})"),
        }
    }
}
