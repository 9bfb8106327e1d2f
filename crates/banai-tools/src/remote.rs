//! Remote execution and file transfer over SSH.
//!
//! `ssh2` is blocking, so every session operation runs on a blocking worker.
//! The channel is pumped in non-blocking mode so the deadline can be checked
//! between reads. A session goes back to the script's pool only after a clean
//! call.

use std::fmt;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use banai_vault::{Secret, SecretKind, Zeroizing};
use serde::Deserialize;
use serde_json::Value;
use ssh2::{ErrorCode, OpenFlags, OpenType, RenameFlags, Session};
use tracing::{debug, info, warn};

use crate::envelope::{ShellResult, to_value};
use crate::error::{CapabilityError, ToolResult};
use crate::pool::Deadline;
use crate::{Args, BuiltinTool, ScriptContext, blocking};

/// libssh2's `LIBSSH2_ERROR_TIMEOUT`.
const SSH_ERROR_TIMEOUT: i32 = -9;
/// SFTP `SSH_FX_NO_SUCH_FILE`.
const SFTP_NO_SUCH_FILE: i32 = 2;
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Where and how to log in.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SshTarget {
    /// `host`, `host:port` or `[v6]:port`.
    pub address: String,
    /// Login user; an SSH secret may supply it.
    pub user: String,
    /// Private key path, resolved against the logical directory.
    pub private_key_file: Option<String>,
    /// Passphrase for `private_key_file`.
    pub passphrase: Option<String>,
    /// Password auth.
    pub password: Option<String>,
    /// Vault secret; wins over the other auth fields.
    pub secret_id: Option<String>,
    /// Deadline in seconds for checkout plus execution, 0 = none.
    pub timeout: Option<u64>,
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("private_key_file", &self.private_key_file)
            .field("has_passphrase", &self.passphrase.is_some())
            .field("has_password", &self.password.is_some())
            .field("secret_id", &self.secret_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SshTarget {
    fn from_args(args: &Args, idx: usize) -> ToolResult<Self> {
        args.required(idx, "target")
    }
}

#[derive(Clone)]
enum Auth {
    KeyFile {
        path: PathBuf,
        passphrase: Option<Zeroizing<String>>,
    },
    Password(Zeroizing<String>),
}

/// A target with its address normalised and its credentials looked up.
#[derive(Clone)]
struct Plan {
    address: String,
    user: String,
    auth: Auth,
    connect_timeout: Duration,
    deadline: Option<Deadline>,
}

/// Append the default port and bracket bare IPv6 literals.
fn normalize_address(address: &str, default_port: u16) -> ToolResult<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CapabilityError::config("ssh target address is required"));
    }
    if address.starts_with('[') {
        if address.contains("]:") {
            return Ok(address.to_owned());
        }
        return Ok(format!("{address}:{default_port}"));
    }
    Ok(match address.matches(':').count() {
        0 => format!("{address}:{default_port}"),
        1 => address.to_owned(),
        _ => format!("[{address}]:{default_port}"),
    })
}

fn non_empty(value: &str) -> Option<Zeroizing<String>> {
    (!value.is_empty()).then(|| Zeroizing::new(value.to_owned()))
}

impl Plan {
    async fn resolve(target: &SshTarget, ctx: &ScriptContext) -> ToolResult<Self> {
        let settings = ctx.settings();
        let address = normalize_address(&target.address, settings.ssh_default_port)?;
        let mut user = target.user.trim().to_owned();

        let auth = if let Some(id) = target.secret_id.as_deref().filter(|s| !s.is_empty()) {
            match ctx.vault().get(id)? {
                Secret::Ssh(cred) => {
                    if user.is_empty() {
                        user.clone_from(&cred.user);
                    }
                    Auth::KeyFile {
                        path: ctx.vault().key_file(id)?,
                        passphrase: non_empty(&cred.passphrase),
                    }
                },
                Secret::UserPass(up) => {
                    if user.is_empty() {
                        user.clone_from(&up.username);
                    }
                    Auth::Password(up.password)
                },
                Secret::Text(_) => {
                    return Err(CapabilityError::SecretTypeMismatch {
                        id: id.to_owned(),
                        expected: SecretKind::Ssh,
                        actual: SecretKind::Text,
                    });
                },
            }
        } else if let Some(key) = target.private_key_file.as_deref().filter(|s| !s.is_empty()) {
            Auth::KeyFile {
                path: ctx.resolve(key).await,
                passphrase: target.passphrase.as_deref().and_then(non_empty),
            }
        } else if let Some(password) = target.password.as_deref() {
            Auth::Password(Zeroizing::new(password.to_owned()))
        } else {
            return Err(CapabilityError::config(
                "ssh target needs one of secretId, privateKeyFile or password",
            ));
        };

        if user.is_empty() {
            return Err(CapabilityError::config("ssh target user is required"));
        }
        Ok(Self {
            address,
            user,
            auth,
            connect_timeout: settings.ssh_connect_timeout,
            deadline: Deadline::after(target.timeout.unwrap_or(settings.remote_timeout_secs)),
        })
    }

    /// Transport failure, or the deadline if it has passed.
    fn connection_error(&self, reason: impl fmt::Display) -> CapabilityError {
        if let Some(d) = self.deadline
            && d.expired()
        {
            return d.error();
        }
        CapabilityError::Connection {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }

    fn ssh_error(&self, e: &ssh2::Error) -> CapabilityError {
        if let (ErrorCode::Session(SSH_ERROR_TIMEOUT), Some(d)) = (e.code(), self.deadline) {
            return d.error();
        }
        self.connection_error(e)
    }

    /// Connect timeout capped by what is left of the deadline.
    fn step_timeout(&self) -> ToolResult<Duration> {
        match self.deadline {
            Some(d) if d.expired() => Err(d.error()),
            Some(d) => Ok(self.connect_timeout.min(d.remaining())),
            None => Ok(self.connect_timeout),
        }
    }
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

fn connect(plan: &Plan) -> ToolResult<Session> {
    let timeout = plan.step_timeout()?;
    let addrs = plan
        .address
        .to_socket_addrs()
        .map_err(|e| plan.connection_error(e))?;
    let mut last = None;
    let mut tcp = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            },
            Err(e) => last = Some(e),
        }
    }
    let tcp = tcp.ok_or_else(|| {
        plan.connection_error(last.map_or_else(|| "no address resolved".to_owned(), |e| e.to_string()))
    })?;

    let mut session = Session::new().map_err(|e| plan.ssh_error(&e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis(plan.step_timeout()?));
    session.handshake().map_err(|e| plan.ssh_error(&e))?;

    match &plan.auth {
        Auth::KeyFile { path, passphrase } => session.userauth_pubkey_file(
            &plan.user,
            None,
            path,
            passphrase.as_ref().map(|p| p.as_str()),
        ),
        Auth::Password(password) => session.userauth_password(&plan.user, password),
    }
    .map_err(|e| plan.ssh_error(&e))?;
    if !session.authenticated() {
        return Err(plan.connection_error("authentication rejected"));
    }
    info!(address = %plan.address, user = %plan.user, "ssh session established");
    Ok(session)
}

/// Run `op` on a pooled session, or a fresh one. A reused session that
/// fails at the transport level is replaced once.
fn on_session<T>(
    idle: Option<Session>,
    plan: &Plan,
    op: impl Fn(&Session, &Plan) -> ToolResult<T>,
) -> ToolResult<(Session, T)> {
    if let Some(session) = idle {
        match op(&session, plan) {
            Ok(value) => return Ok((session, value)),
            Err(e @ CapabilityError::Connection { .. }) => {
                debug!(address = %plan.address, error = %e, "pooled session unusable, reconnecting");
            },
            Err(e) => return Err(e),
        }
    }
    let session = connect(plan)?;
    let value = op(&session, plan)?;
    Ok((session, value))
}

fn pump(reader: &mut impl Read, sink: &mut Vec<u8>, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(buf.get(..n).unwrap_or_default());
            Ok(true)
        },
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

enum Exec {
    Done(ShellResult),
    TimedOut(ShellResult),
}

fn exec(session: &Session, plan: &Plan, cmd: &str) -> ToolResult<Exec> {
    session.set_blocking(true);
    session.set_timeout(millis(plan.step_timeout()?));
    let mut channel = session.channel_session().map_err(|e| plan.ssh_error(&e))?;
    channel.exec(cmd).map_err(|e| plan.ssh_error(&e))?;
    session.set_blocking(false);

    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let mut progressed = pump(&mut channel, &mut out, &mut buf)
            .map_err(|e| plan.connection_error(e))?;
        progressed |= pump(&mut channel.stderr(), &mut err, &mut buf)
            .map_err(|e| plan.connection_error(e))?;
        if channel.eof() {
            break;
        }
        if let Some(d) = plan.deadline
            && d.expired()
        {
            if let Err(e) = channel.close() {
                debug!(error = %e, "closing timed-out channel");
            }
            return Ok(Exec::TimedOut(ShellResult::from_bytes(&out, &err, -1)));
        }
        if !progressed {
            std::thread::sleep(IDLE_POLL);
        }
    }

    session.set_blocking(true);
    channel
        .stderr()
        .read_to_end(&mut err)
        .map_err(|e| plan.connection_error(e))?;
    channel.wait_close().map_err(|e| plan.ssh_error(&e))?;
    let status = channel.exit_status().map_err(|e| plan.ssh_error(&e))?;
    Ok(Exec::Done(ShellResult::from_bytes(&out, &err, i64::from(status))))
}

/// SFTP failure on `path`.
fn sftp_error(plan: &Plan, path: &Path, e: &ssh2::Error) -> CapabilityError {
    match e.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => CapabilityError::not_found(path),
        ErrorCode::SFTP(_) => CapabilityError::io(path, io::Error::other(e.message().to_owned())),
        ErrorCode::Session(_) => plan.ssh_error(e),
    }
}

fn write_remote(
    sftp: &ssh2::Sftp,
    plan: &Plan,
    local: &Path,
    tmp: &Path,
    remote: &Path,
) -> ToolResult<u64> {
    let mut src = std::fs::File::open(local).map_err(|e| CapabilityError::io(local, e))?;
    let mut dst = sftp
        .open_mode(
            tmp,
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            0o644,
            OpenType::File,
        )
        .map_err(|e| sftp_error(plan, tmp, &e))?;
    let n = io::copy(&mut src, &mut dst).map_err(|e| CapabilityError::io(remote, e))?;
    drop(dst);

    let flags = RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE;
    if let Err(first) = sftp.rename(tmp, remote, Some(flags)) {
        // Not atomic: the destination is briefly absent.
        debug!(error = %first, "overwriting rename refused, unlinking destination");
        if let Err(e) = sftp.unlink(remote) {
            debug!(error = %e, "unlink before rename");
        }
        sftp.rename(tmp, remote, None)
            .map_err(|e| sftp_error(plan, remote, &e))?;
    }
    Ok(n)
}

fn upload(session: &Session, plan: &Plan, local: &Path, remote: &Path) -> ToolResult<u64> {
    session.set_blocking(true);
    session.set_timeout(millis(plan.step_timeout()?));
    let sftp = session.sftp().map_err(|e| plan.ssh_error(&e))?;
    let name = remote
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CapabilityError::config(format!("invalid remote path {}", remote.display())))?;
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let tmp = remote.with_file_name(format!(".{name}.banai-up-{}", tag.get(..8).unwrap_or(&tag)));

    let written = write_remote(&sftp, plan, local, &tmp, remote);

    if written.is_err()
        && let Err(e) = sftp.unlink(&tmp)
    {
        debug!(path = %tmp.display(), error = %e, "temp upload not removed");
    }
    written
}

fn download(session: &Session, plan: &Plan, remote: &Path, local: &Path) -> ToolResult<u64> {
    session.set_blocking(true);
    session.set_timeout(millis(plan.step_timeout()?));
    let sftp = session.sftp().map_err(|e| plan.ssh_error(&e))?;
    let mut src = sftp.open(remote).map_err(|e| sftp_error(plan, remote, &e))?;

    let dir = local
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CapabilityError::io(dir, e))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".banai-down-")
        .tempfile_in(dir)
        .map_err(|e| CapabilityError::io(dir, e))?;
    let n = io::copy(&mut src, tmp.as_file_mut()).map_err(|e| CapabilityError::io(remote, e))?;
    tmp.persist(local)
        .map_err(|e| CapabilityError::io(local, e.error))?;
    Ok(n)
}

/// Check out a session, run `op` on a blocking worker and return the
/// session to the pool only if `op` succeeded.
async fn with_session<T, F>(ctx: &ScriptContext, plan: Plan, op: F) -> ToolResult<T>
where
    T: Send + 'static,
    F: Fn(&Session, &Plan) -> ToolResult<T> + Send + 'static,
{
    let mut lease = ctx
        .ssh_pool()
        .checkout(&plan.address, &plan.user, plan.deadline)
        .await?;
    let idle = lease.take_idle();
    let (session, value) = blocking(move || on_session(idle, &plan, op)).await?;
    lease.release(session);
    Ok(value)
}

/// `rsh(target, cmd) -> {out, err, status}`
pub struct RshTool;

#[async_trait::async_trait]
impl BuiltinTool for RshTool {
    fn name(&self) -> &'static str {
        "rsh"
    }

    fn description(&self) -> &'static str {
        "Runs a command on a remote host over SSH."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let target = SshTarget::from_args(&args, 0)?;
        let cmd = args.string(1, "cmd")?;
        let plan = Plan::resolve(&target, ctx).await?;
        debug!(address = %plan.address, user = %plan.user, "remote command");

        let mut lease = ctx
            .ssh_pool()
            .checkout(&plan.address, &plan.user, plan.deadline)
            .await?;
        let idle = lease.take_idle();
        let deadline = plan.deadline;
        let (session, outcome) =
            blocking(move || on_session(idle, &plan, |s, p| exec(s, p, &cmd))).await?;
        match outcome {
            Exec::Done(result) => {
                lease.release(session);
                to_value(&result)
            },
            Exec::TimedOut(partial) => {
                drop(session);
                warn!("remote command timed out, session dropped");
                Err(CapabilityError::Timeout {
                    seconds: deadline.map_or(0, Deadline::seconds),
                    partial: Some(Box::new(partial)),
                })
            },
        }
    }
}

async fn local_file(ctx: &ScriptContext, path: &str) -> ToolResult<PathBuf> {
    let path = ctx.resolve(path).await;
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| CapabilityError::io(&path, e))?;
    if !meta.is_file() {
        return Err(CapabilityError::not_found(&path));
    }
    Ok(path)
}

/// `shUpload(target, localPath, remotePath)`
pub struct ShUploadTool;

#[async_trait::async_trait]
impl BuiltinTool for ShUploadTool {
    fn name(&self) -> &'static str {
        "shUpload"
    }

    fn description(&self) -> &'static str {
        "Uploads a local file over SFTP, replacing the remote file."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let target = SshTarget::from_args(&args, 0)?;
        let local = local_file(ctx, &args.string(1, "localPath")?).await?;
        let remote = PathBuf::from(args.string(2, "remotePath")?);
        let plan = Plan::resolve(&target, ctx).await?;
        let shown = remote.display().to_string();

        let bytes = with_session(ctx, plan, move |s, p| upload(s, p, &local, &remote)).await?;
        info!(remote = %shown, bytes, "uploaded");
        Ok(Value::Null)
    }
}

/// `shDownload(target, remotePath, localPath)`
pub struct ShDownloadTool;

#[async_trait::async_trait]
impl BuiltinTool for ShDownloadTool {
    fn name(&self) -> &'static str {
        "shDownload"
    }

    fn description(&self) -> &'static str {
        "Downloads a remote file over SFTP."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let target = SshTarget::from_args(&args, 0)?;
        let remote = PathBuf::from(args.string(1, "remotePath")?);
        let local = ctx.resolve(&args.string(2, "localPath")?).await;
        let plan = Plan::resolve(&target, ctx).await?;
        let shown = remote.display().to_string();

        let bytes = with_session(ctx, plan, move |s, p| download(s, p, &remote, &local)).await?;
        info!(remote = %shown, bytes, "downloaded");
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::{args, ctx};
    use serde_json::json;
    use tokio::net::TcpListener;

    fn target(v: Value) -> SshTarget {
        serde_json::from_value(v).unwrap()
    }

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("host", 22).unwrap(), "host:22");
        assert_eq!(normalize_address(" host:2222 ", 22).unwrap(), "host:2222");
        assert_eq!(normalize_address("::1", 22).unwrap(), "[::1]:22");
        assert_eq!(normalize_address("[::1]", 2200).unwrap(), "[::1]:2200");
        assert_eq!(normalize_address("[::1]:23", 22).unwrap(), "[::1]:23");
        assert!(normalize_address("  ", 22).is_err());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let t = target(json!({"address": "h", "user": "u", "password": "s3cr3t"}));
        let shown = format!("{t:?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(shown.contains("has_password: true"));
    }

    #[test]
    fn test_unknown_target_field_rejected() {
        let a = args(vec![json!({"address": "h", "pasword": "x"})]);
        let err = SshTarget::from_args(&a, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_secret_wins_and_supplies_user() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let t = target(json!({
            "address": "h",
            "secretId": "deploy",
            "password": "ignored",
            "privateKeyFile": "ignored.pem",
        }));
        let plan = Plan::resolve(&t, &ctx).await.unwrap();
        assert_eq!(plan.user, "ops");
        assert_eq!(plan.address, "h:22");
        match plan.auth {
            Auth::KeyFile { path, passphrase } => {
                assert_eq!(path, ctx.vault().key_file("deploy").unwrap());
                assert_eq!(passphrase.unwrap().as_str(), "pp-1234");
            },
            Auth::Password(_) => panic!("expected key auth"),
        }

        let t = target(json!({"address": "h", "user": "root", "secretId": "deploy"}));
        assert_eq!(Plan::resolve(&t, &ctx).await.unwrap().user, "root");
    }

    #[tokio::test]
    async fn test_userpass_secret_and_text_secret() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let t = target(json!({"address": "h", "secretId": "registry"}));
        let plan = Plan::resolve(&t, &ctx).await.unwrap();
        assert_eq!(plan.user, "ci");
        assert!(matches!(plan.auth, Auth::Password(ref p) if p.as_str() == "hunter2"));

        let t = target(json!({"address": "h", "user": "u", "secretId": "token"}));
        let err = Plan::resolve(&t, &ctx).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::SecretTypeMismatch);
    }

    #[tokio::test]
    async fn test_key_file_beats_password() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let t = target(json!({
            "address": "h", "user": "u", "privateKeyFile": "keys/id", "password": "p",
        }));
        let plan = Plan::resolve(&t, &ctx).await.unwrap();
        match plan.auth {
            Auth::KeyFile { path, passphrase } => {
                assert_eq!(path, dir.path().join("keys/id"));
                assert!(passphrase.is_none());
            },
            Auth::Password(_) => panic!("expected key auth"),
        }
    }

    #[tokio::test]
    async fn test_missing_auth_or_user() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let err = Plan::resolve(&target(json!({"address": "h", "user": "u"})), &ctx)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = Plan::resolve(&target(json!({"address": "h", "password": "p"})), &ctx)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let addr = closed_port().await;
        let err = RshTool
            .execute(
                args(vec![json!({"address": addr, "user": "u", "password": "p"}), json!("true")]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(ctx.ssh_pool().idle(&addr, "u"), 0);
    }

    #[tokio::test]
    async fn test_silent_server_hits_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _hold = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(sock);
        });
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let err = RshTool
            .execute(
                args(vec![
                    json!({"address": addr, "user": "u", "password": "p", "timeout": 1}),
                    json!("sleep 5"),
                ]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_upload_requires_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("adir")).unwrap();
        let ctx = ctx(dir.path());
        let t = json!({"address": closed_port().await, "user": "u", "password": "p"});
        for local in ["missing.txt", "adir"] {
            let err = ShUploadTool
                .execute(args(vec![t.clone(), json!(local), json!("/tmp/x")]), &ctx)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "{local}");
        }
    }

    #[tokio::test]
    async fn test_download_refused_connection() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let t = json!({"address": closed_port().await, "user": "u", "password": "p"});
        let err = ShDownloadTool
            .execute(args(vec![t, json!("/etc/hostname"), json!("out/hostname")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(!dir.path().join("out/hostname").exists());
    }
}
