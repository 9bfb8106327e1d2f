//! Per-host services and per-script execution state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use banai_vault::SecretVault;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::docker::ContainerEngine;
use crate::http::HttpClients;
use crate::paths;
use crate::pool::SessionPool;

/// Tunables the builtins read at call time.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Default interpreter for `sh`/`shScript`.
    pub shell_program: String,
    /// Interpreter used when `shell_program` is not on `PATH`.
    pub shell_fallback: String,
    /// Live SSH sessions per `(address, user)`.
    pub ssh_pool_size: usize,
    /// TCP + handshake timeout.
    pub ssh_connect_timeout: Duration,
    /// Port appended to SSH addresses without one.
    pub ssh_default_port: u16,
    /// Grace period before a stopped container is killed.
    pub docker_stop_grace: Duration,
    /// Default HTTP request timeout.
    pub http_timeout: Duration,
    /// Default redirect policy.
    pub http_allow_redirect: bool,
    /// Redirect hop limit.
    pub http_max_redirects: usize,
    /// `User-Agent` header.
    pub http_user_agent: String,
    /// Default timeout for local processes in seconds, 0 = none.
    pub shell_timeout_secs: u64,
    /// Default timeout for remote commands in seconds, 0 = none.
    pub remote_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            shell_program: "bash".to_owned(),
            shell_fallback: "sh".to_owned(),
            ssh_pool_size: 4,
            ssh_connect_timeout: Duration::from_secs(10),
            ssh_default_port: 22,
            docker_stop_grace: Duration::from_secs(10),
            http_timeout: Duration::from_secs(60),
            http_allow_redirect: true,
            http_max_redirects: 10,
            http_user_agent: concat!("banai/", env!("CARGO_PKG_VERSION")).to_owned(),
            shell_timeout_secs: 0,
            remote_timeout_secs: 0,
        }
    }
}

/// Services shared by every script a host runs.
pub struct HostServices {
    /// Secret vault.
    pub vault: Arc<SecretVault>,
    /// Container engine.
    pub containers: Arc<dyn ContainerEngine>,
    /// HTTP client cache.
    pub http: HttpClients,
    /// Tunables.
    pub settings: ToolSettings,
}

impl HostServices {
    /// Bundle services.
    #[must_use]
    pub fn new(
        vault: Arc<SecretVault>,
        containers: Arc<dyn ContainerEngine>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            vault,
            containers,
            http: HttpClients::new(&settings),
            settings,
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("vault", &self.vault)
            .field("containers", &self.containers.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// State of one script execution.
///
/// Each script gets its own logical directory, environment snapshot and SSH
/// pool. Host services are shared.
pub struct ScriptContext {
    /// Identifies this execution in logs.
    pub script_id: Uuid,
    /// Logical current directory.
    pub cwd: Arc<RwLock<PathBuf>>,
    env: std::sync::RwLock<Arc<BTreeMap<String, String>>>,
    services: Arc<HostServices>,
    ssh_pool: SessionPool,
}

impl ScriptContext {
    /// New execution starting in `cwd`, with the environment captured now.
    #[must_use]
    pub fn new(services: Arc<HostServices>, cwd: PathBuf) -> Self {
        let ssh_pool = SessionPool::new(services.settings.ssh_pool_size);
        Self {
            script_id: Uuid::new_v4(),
            cwd: Arc::new(RwLock::new(cwd)),
            env: std::sync::RwLock::new(Arc::new(capture_env())),
            services,
            ssh_pool,
        }
    }

    /// Shared host services.
    #[must_use]
    pub fn services(&self) -> &HostServices {
        &self.services
    }

    /// Secret vault.
    #[must_use]
    pub fn vault(&self) -> &SecretVault {
        &self.services.vault
    }

    /// Tunables.
    #[must_use]
    pub fn settings(&self) -> &ToolSettings {
        &self.services.settings
    }

    /// This script's SSH pool.
    #[must_use]
    pub fn ssh_pool(&self) -> &SessionPool {
        &self.ssh_pool
    }

    /// Current logical directory.
    pub async fn cwd(&self) -> PathBuf {
        self.cwd.read().await.clone()
    }

    /// Resolve `path` against the logical directory, lexically.
    pub async fn resolve(&self, path: &str) -> PathBuf {
        let cwd = self.cwd().await;
        resolve_in(&cwd, path)
    }

    /// Environment snapshot.
    #[must_use]
    pub fn env_snapshot(&self) -> Arc<BTreeMap<String, String>> {
        Arc::clone(&self.env.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-capture the process environment.
    pub fn refresh_env(&self) {
        let fresh = Arc::new(capture_env());
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("script_id", &self.script_id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn resolve_in(cwd: &Path, path: &str) -> PathBuf {
    PathBuf::from(paths::abs(path, &cwd.to_string_lossy()))
}

fn capture_env() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
