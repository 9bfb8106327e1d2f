#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Builtin capabilities of the Banai script host.
//!
//! Every builtin is a [`BuiltinTool`]: positional JSON arguments in, a JSON
//! value or a [`CapabilityError`] out. [`ToolRegistry::dispatch`] is the one
//! entry point the script evaluator calls; it logs each call inside a
//! [`CallContext`](banai_telemetry::CallContext) span and turns failures into
//! redacted [`ScriptException`]s.

mod archive;
mod args;
mod context;
mod docker;
mod envelope;
mod error;
mod fs;
mod hash;
mod http;
pub mod paths;
mod pool;
mod remote;
mod secrets;
mod shell;

pub use archive::{ArUnzipTool, ArZipTool};
pub use args::Args;
pub use context::{HostServices, ScriptContext, ToolSettings};
pub use docker::{
    BollardEngine, ContainerEngine, ContainerRef, ContainerStatus, DkrListTool, DkrStopTool,
    UnavailableEngine,
};
pub use envelope::ShellResult;
pub use error::{CapabilityError, ErrorKind, ScriptException, ToolResult};
pub use fs::{
    FsAbsTool, FsCopyTool, FsCreateDirTool, FsJoinTool, FsListTool, FsMoveTool, FsReadTool,
    FsRemoveDirTool, FsRemoveTool, FsSplitTool, FsWriteTool, ListingFilter,
};
pub use hash::HashTool;
pub use http::{HeaderValues, HttpClients, HttpFormTool, HttpOptions, HttpTool};
pub use pool::SessionPool;
pub use remote::{RshTool, ShDownloadTool, ShUploadTool, SshTarget};
pub use secrets::{GetSshSecretTool, GetTextSecretTool, GetUserPassSecretTool};
pub use shell::{CommandOptions, EnvTool, ShCdTool, ShPwdTool, ShScriptTool, ShTool};

use std::collections::HashMap;
use std::sync::Arc;

use banai_telemetry::CallContext;
use serde_json::Value;
use tracing::{Instrument, debug, info};

/// A builtin callable from scripts.
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Name scripts call it by.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Run the builtin.
    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value>;
}

/// Lookup table from builtin name to implementation.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn BuiltinTool>>,
    aliases: HashMap<&'static str, &'static str>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Registry with every builtin and the `cd`/`pwd` aliases.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(ShTool));
        registry.register(Arc::new(ShScriptTool));
        registry.register(Arc::new(ShCdTool));
        registry.register(Arc::new(ShPwdTool));
        registry.register(Arc::new(EnvTool));

        registry.register(Arc::new(RshTool));
        registry.register(Arc::new(ShUploadTool));
        registry.register(Arc::new(ShDownloadTool));

        registry.register(Arc::new(FsReadTool));
        registry.register(Arc::new(FsWriteTool));
        registry.register(Arc::new(FsCopyTool));
        registry.register(Arc::new(FsMoveTool));
        registry.register(Arc::new(FsRemoveTool));
        registry.register(Arc::new(FsCreateDirTool));
        registry.register(Arc::new(FsRemoveDirTool));
        registry.register(Arc::new(FsListTool));
        registry.register(Arc::new(FsSplitTool));
        registry.register(Arc::new(FsJoinTool));
        registry.register(Arc::new(FsAbsTool));

        registry.register(Arc::new(ArZipTool));
        registry.register(Arc::new(ArUnzipTool));

        registry.register(Arc::new(DkrListTool));
        registry.register(Arc::new(DkrStopTool));

        for tool in HashTool::all() {
            registry.register(Arc::new(tool));
        }
        for tool in HttpTool::all() {
            registry.register(Arc::new(tool));
        }
        registry.register(Arc::new(HttpFormTool));

        registry.register(Arc::new(GetTextSecretTool));
        registry.register(Arc::new(GetSshSecretTool));
        registry.register(Arc::new(GetUserPassSecretTool));

        registry.alias("cd", "shCD");
        registry.alias("pwd", "shPWD");
        registry.alias("fsChdir", "shCD");
        registry.alias("fsPwd", "shPWD");
        registry
    }

    /// Register a builtin, replacing any with the same name.
    pub fn register(&mut self, tool: Arc<dyn BuiltinTool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Make `alias` resolve to `target`.
    pub fn alias(&mut self, alias: &'static str, target: &'static str) {
        self.aliases.insert(alias, target);
    }

    /// Look up a builtin by name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn BuiltinTool>> {
        let name = self.aliases.get(name).copied().unwrap_or(name);
        self.tools.get(name)
    }

    /// Sorted names of all builtins, aliases excluded.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Call builtin `name` and translate failures into script exceptions.
    ///
    /// # Errors
    ///
    /// A redacted [`ScriptException`] for an unknown builtin or any failure.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Vec<Value>,
        ctx: &ScriptContext,
    ) -> Result<Value, ScriptException> {
        let Some(tool) = self.get(name) else {
            let err = CapabilityError::config(format!("unknown builtin '{name}'"));
            return Err(ScriptException::from_error(&err, ctx.vault()));
        };

        let call = CallContext::new(ctx.script_id, tool.name());
        let span = call.span();
        debug!(parent: &span, args = args.len(), "dispatching builtin");

        let outcome = tool.execute(Args::new(args), ctx).instrument(span.clone()).await;

        let _enter = span.enter();
        match outcome {
            Ok(value) => {
                info!(builtin = tool.name(), elapsed_ms = call.elapsed_ms(), "builtin completed");
                Ok(value)
            },
            Err(err) => {
                let exception = ScriptException::from_error(&err, ctx.vault());
                info!(
                    builtin = tool.name(),
                    elapsed_ms = call.elapsed_ms(),
                    kind = %exception.kind,
                    "builtin failed"
                );
                Err(exception)
            },
        }
    }
}

/// Run blocking filesystem or library work off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> ToolResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ToolResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CapabilityError::task(&e))?
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}
