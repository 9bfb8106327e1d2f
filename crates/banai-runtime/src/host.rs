use std::path::{Path, PathBuf};
use std::sync::Arc;

use banai_config::{Config, ResolvedConfig};
use banai_tools::{
    BollardEngine, ContainerEngine, HostServices, ScriptContext, ScriptException, ToolRegistry,
    ToolSettings, UnavailableEngine,
};
use banai_vault::{JsonFileSecretStore, MemorySecretStore, SecretVault};
use serde_json::Value;
use tracing::{info, warn};

use crate::HostResult;
use crate::config_bridge::to_tool_settings;

/// Process-wide services plus the builtin registry.
#[derive(Clone)]
pub struct Host {
    services: Arc<HostServices>,
    registry: Arc<ToolRegistry>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("services", &self.services)
            .field("builtins", &self.registry.names().len())
            .finish()
    }
}

impl Host {
    /// Start building a host from explicit parts.
    #[must_use]
    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }

    /// Load the layered configuration and build a host from it.
    ///
    /// # Errors
    ///
    /// Fails when the configuration or the secrets file cannot be loaded.
    pub fn load(workspace_root: Option<&Path>) -> HostResult<(Self, ResolvedConfig)> {
        let resolved = Config::load(workspace_root)?;
        let host = Self::from_config(&resolved.config)?;
        Ok((host, resolved))
    }

    /// Build a host from an already loaded configuration.
    ///
    /// The container engine is connected lazily by `bollard`; when even the
    /// client cannot be built, container builtins report `UnavailableError`.
    ///
    /// # Errors
    ///
    /// Fails when the secrets file cannot be read or parsed.
    pub fn from_config(cfg: &Config) -> HostResult<Self> {
        let key_dir = cfg.secrets.key_dir.as_deref();
        let vault = match &cfg.secrets.file {
            Some(path) => {
                SecretVault::from_store_with_key_dir(&JsonFileSecretStore::new(path), key_dir)?
            },
            None => SecretVault::from_store_with_key_dir(&MemorySecretStore::new(), key_dir)?,
        };

        let containers: Arc<dyn ContainerEngine> =
            match BollardEngine::connect(cfg.docker.socket.as_deref(), cfg.docker.timeout_secs) {
                Ok(engine) => Arc::new(engine),
                Err(e) => {
                    warn!(error = %e, "container engine unavailable");
                    Arc::new(UnavailableEngine::new(e.to_string()))
                },
            };

        Self::builder()
            .vault(vault)
            .container_engine(containers)
            .settings(to_tool_settings(cfg))
            .build()
    }

    /// Fresh per-script state rooted at `cwd`.
    #[must_use]
    pub fn new_script_context(&self, cwd: impl Into<PathBuf>) -> ScriptContext {
        ScriptContext::new(Arc::clone(&self.services), cwd.into())
    }

    /// Invoke a builtin by name.
    ///
    /// # Errors
    ///
    /// Returns the redacted [`ScriptException`] of a failed call.
    pub async fn call(
        &self,
        ctx: &ScriptContext,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, ScriptException> {
        self.registry.dispatch(name, args, ctx).await
    }

    /// Shared services.
    #[must_use]
    pub fn services(&self) -> &Arc<HostServices> {
        &self.services
    }

    /// Builtin registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Secret vault.
    #[must_use]
    pub fn vault(&self) -> &SecretVault {
        &self.services.vault
    }
}

/// Assembles a [`Host`]. Unset parts fall back to an empty vault, an
/// unavailable container engine, default settings and every builtin.
#[derive(Default)]
pub struct HostBuilder {
    vault: Option<SecretVault>,
    containers: Option<Arc<dyn ContainerEngine>>,
    settings: Option<ToolSettings>,
    registry: Option<ToolRegistry>,
}

impl HostBuilder {
    /// Use this vault.
    #[must_use]
    pub fn vault(mut self, vault: SecretVault) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Use this container engine.
    #[must_use]
    pub fn container_engine(mut self, engine: Arc<dyn ContainerEngine>) -> Self {
        self.containers = Some(engine);
        self
    }

    /// Use these tunables.
    #[must_use]
    pub fn settings(mut self, settings: ToolSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the default registry.
    #[must_use]
    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Finish.
    ///
    /// # Errors
    ///
    /// Fails only when no vault was given and the default one cannot create
    /// its key directory.
    pub fn build(self) -> HostResult<Host> {
        let vault = match self.vault {
            Some(v) => v,
            None => SecretVault::empty()?,
        };
        let containers = self.containers.unwrap_or_else(|| {
            Arc::new(UnavailableEngine::new("no container engine configured"))
        });
        let registry = self.registry.unwrap_or_else(ToolRegistry::with_defaults);
        let services = HostServices::new(
            Arc::new(vault),
            containers,
            self.settings.unwrap_or_default(),
        );
        info!(
            secrets = services.vault.len(),
            engine = services.containers.name(),
            builtins = registry.names().len(),
            "host ready"
        );
        Ok(Host {
            services: Arc::new(services),
            registry: Arc::new(registry),
        })
    }
}
