//! Throwaway OpenSSH server for the remote builtins.
//!
//! Runs the system `sshd` on a loopback port as the current user, with
//! public-key auth only and the internal SFTP subsystem. [`SshServer::start`]
//! returns `None` when `sshd` or `ssh-keygen` is missing or the daemon will
//! not come up, so callers can skip instead of failing.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::{debug, warn};

const STARTUP: Duration = Duration::from_secs(5);

/// A running `sshd`, killed on drop.
pub struct SshServer {
    child: Child,
    port: u16,
    user: String,
    key: PathBuf,
    dir: TempDir,
}

fn find_sshd() -> Option<PathBuf> {
    which::which("sshd").ok().or_else(|| {
        ["/usr/sbin/sshd", "/usr/local/sbin/sshd", "/sbin/sshd"]
            .into_iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    })
}

fn keygen(keygen: &Path, path: &Path) -> Option<()> {
    let status = Command::new(keygen)
        .args(["-q", "-t", "ecdsa", "-b", "256", "-m", "PEM", "-N", ""])
        .arg("-f")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()?;
    status.success().then_some(())
}

fn current_user() -> Option<String> {
    if let Ok(user) = std::env::var("USER")
        && !user.is_empty()
    {
        return Some(user);
    }
    let out = Command::new("id").arg("-un").output().ok()?;
    let user = String::from_utf8(out.stdout).ok()?.trim().to_owned();
    (!user.is_empty()).then_some(user)
}

fn free_port() -> Option<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).ok()?;
    Some(listener.local_addr().ok()?.port())
}

impl SshServer {
    /// Start a daemon, or `None` if this machine cannot run one.
    #[must_use]
    pub fn start() -> Option<Self> {
        let Some(sshd) = find_sshd() else {
            warn!("sshd not installed, skipping");
            return None;
        };
        let Ok(ssh_keygen) = which::which("ssh-keygen") else {
            warn!("ssh-keygen not installed, skipping");
            return None;
        };
        let dir = TempDir::new().ok()?;
        let host_key = dir.path().join("host_key");
        let key = dir.path().join("id_client");
        keygen(&ssh_keygen, &host_key)?;
        keygen(&ssh_keygen, &key)?;
        std::fs::copy(key.with_extension("pub"), dir.path().join("authorized_keys")).ok()?;
        let user = current_user()?;
        let port = free_port()?;

        let mut config = String::new();
        for line in [
            format!("Port {port}"),
            "ListenAddress 127.0.0.1".to_owned(),
            format!("HostKey {}", host_key.display()),
            format!("AuthorizedKeysFile {}", dir.path().join("authorized_keys").display()),
            format!("PidFile {}", dir.path().join("sshd.pid").display()),
            "PubkeyAuthentication yes".to_owned(),
            "PasswordAuthentication no".to_owned(),
            "StrictModes no".to_owned(),
            "UsePAM no".to_owned(),
            "Subsystem sftp internal-sftp".to_owned(),
        ] {
            let _ = writeln!(config, "{line}");
        }
        let config_path = dir.path().join("sshd_config");
        std::fs::write(&config_path, config).ok()?;

        let child = Command::new(&sshd)
            .arg("-D")
            .arg("-e")
            .arg("-f")
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;
        let mut server = Self {
            child,
            port,
            user,
            key,
            dir,
        };
        server.wait_ready().then_some(server)
    }

    fn wait_ready(&mut self) -> bool {
        let started = Instant::now();
        while started.elapsed() < STARTUP {
            if let Ok(Some(status)) = self.child.try_wait() {
                warn!(%status, "sshd exited during startup, skipping");
                return false;
            }
            if TcpStream::connect((Ipv4Addr::LOCALHOST, self.port)).is_ok() {
                debug!(port = self.port, "sshd ready");
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        warn!("sshd did not start listening, skipping");
        false
    }

    /// `127.0.0.1:<port>`, as the pool keys sessions.
    #[must_use]
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Login user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Client private key accepted by the daemon.
    #[must_use]
    pub fn key_file(&self) -> &Path {
        &self.key
    }

    /// Scratch directory the daemon owns; safe for remote paths.
    #[must_use]
    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// Target object for `rsh`, `shUpload` and `shDownload`.
    #[must_use]
    pub fn target(&self) -> Value {
        json!({
            "address": self.address(),
            "user": self.user,
            "privateKeyFile": self.key.display().to_string(),
        })
    }
}

impl Drop for SshServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
