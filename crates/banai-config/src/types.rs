//! Configuration struct definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only has to name
//! the fields it changes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the Banai host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local process execution.
    pub shell: ShellSection,
    /// SSH connections and pooling.
    pub ssh: SshSection,
    /// Container engine access.
    pub docker: DockerSection,
    /// Outbound HTTP defaults.
    pub http: HttpSection,
    /// Secret store location.
    pub secrets: SecretsSection,
    /// Logging and tracing.
    pub logging: LoggingSection,
    /// Default per-call timeouts.
    pub timeouts: TimeoutsSection,
}

// ---------------------------------------------------------------------------
// ShellSection
// ---------------------------------------------------------------------------

/// Shell used when a call does not name one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Preferred shell, looked up on `PATH` when not absolute.
    pub program: String,
    /// Used when `program` cannot be found.
    pub fallback: String,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            program: "bash".to_owned(),
            fallback: "sh".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// SshSection
// ---------------------------------------------------------------------------

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSection {
    /// Maximum live sessions per `(address, user)` within one script.
    pub pool_size: usize,
    /// TCP connect and handshake timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Port used when an address has none.
    pub default_port: u16,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            pool_size: 4,
            connect_timeout_secs: 10,
            default_port: 22,
        }
    }
}

// ---------------------------------------------------------------------------
// DockerSection
// ---------------------------------------------------------------------------

/// Container engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    /// Engine socket path. `None` uses the platform default.
    pub socket: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Seconds the engine waits before killing a stopping container.
    pub stop_grace_secs: u64,
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: 30,
            stop_grace_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpSection
// ---------------------------------------------------------------------------

/// Outbound HTTP defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Request timeout in seconds when a call does not set one (0 = none).
    pub timeout_secs: u64,
    /// Follow redirects unless a call says otherwise.
    pub allow_redirect: bool,
    /// Redirect hop limit.
    pub max_redirects: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            allow_redirect: true,
            max_redirects: 10,
            user_agent: "banai/0.1".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// SecretsSection
// ---------------------------------------------------------------------------

/// Where secrets come from.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSection {
    /// JSON secrets file. `None` starts with an empty vault.
    pub file: Option<PathBuf>,
    /// Directory for materialised key files. `None` uses a private temp dir.
    pub key_dir: Option<PathBuf>,
}

// Only the presence of the secrets file is shown.
impl fmt::Debug for SecretsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsSection")
            .field("has_file", &self.file.is_some())
            .field("key_dir", &self.key_dir)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives (e.g. `["banai_tools=debug"]`).
    pub directives: Vec<String>,
    /// Write rolling log files here instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            directory: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutsSection
// ---------------------------------------------------------------------------

/// Default timeouts applied when a call sets none. `0` means unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Local `sh`/`shScript` calls, in seconds.
    pub shell_secs: u64,
    /// Remote `rsh`/transfer calls, in seconds.
    pub remote_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str("[ssh]\npool_size = 9\n").unwrap();
        assert_eq!(config.ssh.pool_size, 9);
        assert_eq!(config.ssh.connect_timeout_secs, 10);
        assert_eq!(config.shell.program, "bash");
    }

    #[test]
    fn test_secrets_debug_hides_file() {
        let section = SecretsSection {
            file: Some(PathBuf::from("/home/ops/prod-secrets.json")),
            key_dir: None,
        };
        let debug = format!("{section:?}");
        assert!(!debug.contains("prod-secrets"));
        assert!(debug.contains("has_file: true"));
    }
}
