//! Local process execution and the logical working directory.
//!
//! `sh` and `shScript` spawn the configured shell in the script's logical
//! directory, feed optional stdin, and capture stdout/stderr on background
//! tasks so a chatty child never blocks on a full pipe. A timeout kills the
//! child's whole process group before the error is returned.
//!
//! # Secret injection
//!
//! With `secretId` set, the child receives (overriding `env` entries):
//!
//! | Secret kind | Variables |
//! |---|---|
//! | text | `BANAI_SECRET_TEXT` |
//! | userpass | `BANAI_SECRET_USER`, `BANAI_SECRET_PASSWORD` |
//! | ssh | `BANAI_SECRET_SSH_USER`, `BANAI_SECRET_SSH_KEY_FILE`, `BANAI_SECRET_SSH_PASSPHRASE` |
//!
//! The key file is the vault's owner-only copy of the private key.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use banai_vault::{Secret, SecretVault, Zeroizing};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::envelope::{ShellResult, to_value};
use crate::error::{CapabilityError, ToolResult};
use crate::{Args, BuiltinTool, ScriptContext};

/// How long to wait for the pipes to drain after a timeout kill.
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 8192;

/// Options accepted by `sh` and `shScript`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandOptions {
    /// Interpreter override; empty means the configured default.
    pub shell: String,
    /// Text written to stdin, followed by a newline.
    #[serde(rename = "in", alias = "stdin")]
    pub stdin: Option<String>,
    /// Lines written to stdin, each followed by a newline.
    #[serde(rename = "ins", alias = "stdinLines")]
    pub stdin_lines: Option<Vec<String>>,
    /// Extra `KEY=VALUE` entries for the child only.
    pub env: Vec<String>,
    /// Seconds; `0` disables, absent uses the host default.
    #[serde(alias = "timeoutSeconds")]
    pub timeout: Option<u64>,
    /// Secret to expose to the child, see the module docs.
    pub secret_id: Option<String>,
}

impl CommandOptions {
    /// Parse the optional options argument at `idx`.
    pub(crate) fn from_args(args: &Args, idx: usize) -> ToolResult<Self> {
        let opts: Self = args.optional(idx, "options")?.unwrap_or_default();
        opts.validate()?;
        Ok(opts)
    }

    /// Reject combinations that cannot be executed.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] when both `in` and `ins` carry input or an
    /// `env` entry is not `KEY=VALUE` with a non-empty key.
    pub fn validate(&self) -> ToolResult<()> {
        let has_in = self.stdin.as_deref().is_some_and(|s| !s.is_empty());
        let has_ins = self.stdin_lines.as_ref().is_some_and(|l| !l.is_empty());
        if has_in && has_ins {
            return Err(CapabilityError::config(
                "options 'in' and 'ins' are mutually exclusive",
            ));
        }
        self.env_pairs().map(|_| ())
    }

    fn env_pairs(&self) -> ToolResult<Vec<(&str, &str)>> {
        self.env
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key, value)),
                _ => Err(CapabilityError::config(format!(
                    "env entry '{entry}' must have the form KEY=VALUE"
                ))),
            })
            .collect()
    }

    fn stdin_payload(&self) -> Option<String> {
        if let Some(text) = self.stdin.as_deref().filter(|s| !s.is_empty()) {
            return Some(format!("{text}\n"));
        }
        let lines = self.stdin_lines.as_ref().filter(|l| !l.is_empty())?;
        Some(lines.iter().map(|l| format!("{l}\n")).collect())
    }

    fn timeout_or(&self, default_secs: u64) -> Option<Duration> {
        match self.timeout.unwrap_or(default_secs) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// What to spawn.
struct ProcessSpec {
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
    env: Vec<(String, String)>,
    secret_env: Vec<(&'static str, Zeroizing<String>)>,
    stdin: Option<String>,
    timeout: Option<Duration>,
}

/// Run `invocation` with `opts` applied.
async fn run_with_options(
    ctx: &ScriptContext,
    invocation: Invocation,
    opts: &CommandOptions,
) -> ToolResult<ShellResult> {
    let settings = ctx.settings();
    let program = resolve_shell(&opts.shell, &settings.shell_program, &settings.shell_fallback)?;
    let args = match invocation {
        Invocation::Inline(cmd) => vec![command_flag(&program).to_owned(), cmd],
        Invocation::Script(path) => vec![path.to_string_lossy().into_owned()],
    };
    let secret_env = match opts.secret_id.as_deref() {
        Some(id) => secret_env(ctx.vault(), id)?,
        None => Vec::new(),
    };
    let spec = ProcessSpec {
        program,
        args,
        cwd: ctx.cwd().await,
        env: opts
            .env_pairs()?
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect(),
        secret_env,
        stdin: opts.stdin_payload(),
        timeout: opts.timeout_or(settings.shell_timeout_secs),
    };
    debug!(
        shell = %spec.program.display(),
        cwd = %spec.cwd.display(),
        timeout_secs = spec.timeout.map(|t| t.as_secs()),
        "spawning process"
    );
    run_process(spec).await
}

enum Invocation {
    Inline(String),
    Script(PathBuf),
}

async fn run_process(spec: ProcessSpec) -> ToolResult<ShellResult> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .envs(spec.secret_env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            CapabilityError::NotFound(format!("cannot start {}", spec.program.display()))
        },
        _ => CapabilityError::io(&spec.program, e),
    })?;

    let out = Arc::new(Mutex::new(Vec::new()));
    let err = Arc::new(Mutex::new(Vec::new()));
    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(stdout, Arc::clone(&out))));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(stderr, Arc::clone(&err))));
    }
    if let (Some(mut stdin), Some(payload)) = (child.stdin.take(), spec.stdin) {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!(error = %e, "child closed stdin early");
            }
        });
    }

    // The deadline covers the wait and the pipe drain: a background
    // grandchild can hold the pipes open after the shell exits.
    let group = child.id().and_then(|id| i32::try_from(id).ok());
    let deadline = spec
        .timeout
        .and_then(|limit| tokio::time::Instant::now().checked_add(limit));
    let mut drained = 0usize;
    let finished = {
        let run = async {
            let status = child.wait().await?;
            for pump in &mut pumps {
                if let Err(e) = pump.await {
                    warn!(error = %e, "output pump failed");
                }
                drained = drained.saturating_add(1);
            }
            Ok::<_, std::io::Error>(status)
        };
        match deadline {
            Some(at) => tokio::time::timeout_at(at, run).await.ok(),
            None => Some(run.await),
        }
    };

    match finished {
        Some(status) => {
            let status = status.map_err(|e| CapabilityError::io(&spec.program, e))?;
            Ok(collect(&out, &err, exit_code(status)).await)
        },
        None => {
            kill_tree(group, &mut child).await;
            drain(pumps.into_iter().skip(drained).collect()).await;
            let partial = collect(&out, &err, -1).await;
            let seconds = spec.timeout.map_or(0, |t| t.as_secs());
            warn!(timeout_secs = seconds, "process timed out and was killed");
            Err(CapabilityError::Timeout {
                seconds,
                partial: Some(Box::new(partial)),
            })
        },
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
        }
    }
}

async fn drain(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, pump).await.is_err() {
            abort.abort();
        }
    }
}

async fn collect(out: &Mutex<Vec<u8>>, err: &Mutex<Vec<u8>>, status: i64) -> ShellResult {
    ShellResult::from_bytes(&out.lock().await, &err.lock().await, status)
}

/// SIGKILL the child's process group, then reap the child.
///
/// `group` is captured at spawn: once the child has been reaped its id is
/// gone but the group lives on while any member does.
async fn kill_tree(group: Option<i32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = group {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(error = %e, pid, "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = group;
    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone");
    }
}

/// Exit code, or `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i64 {
    if let Some(code) = status.code() {
        return i64::from(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return i64::from(signal).saturating_add(128);
        }
    }
    -1
}

fn resolve_shell(requested: &str, default: &str, fallback: &str) -> ToolResult<PathBuf> {
    if !requested.is_empty() {
        return which::which(requested)
            .map_err(|_| CapabilityError::NotFound(format!("shell '{requested}'")));
    }
    which::which(default)
        .or_else(|_| which::which(fallback))
        .map_err(|_| CapabilityError::NotFound(format!("shell '{default}' or '{fallback}'")))
}

fn command_flag(shell: &Path) -> &'static str {
    let stem = shell
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match stem.as_str() {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    }
}

fn secret_env(
    vault: &SecretVault,
    id: &str,
) -> ToolResult<Vec<(&'static str, Zeroizing<String>)>> {
    let vars = match vault.get(id)? {
        Secret::Text(text) => vec![("BANAI_SECRET_TEXT", text)],
        Secret::UserPass(up) => vec![
            ("BANAI_SECRET_USER", Zeroizing::new(up.username)),
            ("BANAI_SECRET_PASSWORD", up.password),
        ],
        Secret::Ssh(ssh) => {
            let key_file = vault.key_file(id)?;
            vec![
                ("BANAI_SECRET_SSH_USER", Zeroizing::new(ssh.user)),
                (
                    "BANAI_SECRET_SSH_KEY_FILE",
                    Zeroizing::new(key_file.to_string_lossy().into_owned()),
                ),
                ("BANAI_SECRET_SSH_PASSPHRASE", ssh.passphrase),
            ]
        },
    };
    debug!(secret_id = id, vars = vars.len(), "injecting secret into child env");
    Ok(vars)
}

/// `sh(cmd, opts?)`
pub struct ShTool;

#[async_trait::async_trait]
impl BuiltinTool for ShTool {
    fn name(&self) -> &'static str {
        "sh"
    }

    fn description(&self) -> &'static str {
        "Runs a command line through the shell and returns {out, err, status}."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let cmd = args.string(0, "cmd")?;
        let opts = CommandOptions::from_args(&args, 1)?;
        let result = run_with_options(ctx, Invocation::Inline(cmd), &opts).await?;
        to_value(&result)
    }
}

/// `shScript(path, opts?)`
pub struct ShScriptTool;

#[async_trait::async_trait]
impl BuiltinTool for ShScriptTool {
    fn name(&self) -> &'static str {
        "shScript"
    }

    fn description(&self) -> &'static str {
        "Runs a script file with the shell and returns {out, err, status}."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = ctx.resolve(&args.string(0, "path")?).await;
        let opts = CommandOptions::from_args(&args, 1)?;
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(CapabilityError::not_found(&path));
        }
        let result = run_with_options(ctx, Invocation::Script(path), &opts).await?;
        to_value(&result)
    }
}

/// `shCD(path)`, aliases `cd` and `fsChdir`.
pub struct ShCdTool;

#[async_trait::async_trait]
impl BuiltinTool for ShCdTool {
    fn name(&self) -> &'static str {
        "shCD"
    }

    fn description(&self) -> &'static str {
        "Changes the script's logical directory; fails without moving if the target is not a directory."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let target = ctx.resolve(&args.string(0, "path")?).await;
        let canonical = tokio::fs::canonicalize(&target)
            .await
            .map_err(|_| CapabilityError::not_found(&target))?;
        let is_dir = tokio::fs::metadata(&canonical)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(CapabilityError::NotFound(format!(
                "{} is not a directory",
                target.display()
            )));
        }
        let shown = canonical.to_string_lossy().into_owned();
        *ctx.cwd.write().await = canonical;
        debug!(cwd = %shown, "changed logical directory");
        Ok(Value::String(shown))
    }
}

/// `shPWD()`, aliases `pwd` and `fsPwd`.
pub struct ShPwdTool;

#[async_trait::async_trait]
impl BuiltinTool for ShPwdTool {
    fn name(&self) -> &'static str {
        "shPWD"
    }

    fn description(&self) -> &'static str {
        "Returns the script's logical directory."
    }

    async fn execute(&self, _args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        Ok(Value::String(ctx.cwd().await.to_string_lossy().into_owned()))
    }
}

/// `env()` returns the snapshot mapping; `env(name)` one value or null.
pub struct EnvTool;

#[async_trait::async_trait]
impl BuiltinTool for EnvTool {
    fn name(&self) -> &'static str {
        "env"
    }

    fn description(&self) -> &'static str {
        "Returns the read-only environment snapshot, or one variable of it."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let snapshot = ctx.env_snapshot();
        match args.optional::<String>(0, "name")? {
            Some(name) => Ok(snapshot
                .get(&name)
                .map_or(Value::Null, |v| Value::String(v.clone()))),
            None => to_value(&*snapshot),
        }
    }
}
