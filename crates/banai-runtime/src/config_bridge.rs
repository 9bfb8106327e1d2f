//! Translation from [`banai_config::Config`] to the types the builtins and
//! the logging layer consume.

use std::time::Duration;

use banai_config::Config;
use banai_telemetry::{LogConfig, setup_logging};
use banai_tools::ToolSettings;

use crate::HostResult;

/// Tunables for the builtins.
#[must_use]
pub fn to_tool_settings(cfg: &Config) -> ToolSettings {
    ToolSettings {
        shell_program: cfg.shell.program.clone(),
        shell_fallback: cfg.shell.fallback.clone(),
        ssh_pool_size: cfg.ssh.pool_size,
        ssh_connect_timeout: Duration::from_secs(cfg.ssh.connect_timeout_secs),
        ssh_default_port: cfg.ssh.default_port,
        docker_stop_grace: Duration::from_secs(cfg.docker.stop_grace_secs),
        http_timeout: Duration::from_secs(cfg.http.timeout_secs),
        http_allow_redirect: cfg.http.allow_redirect,
        http_max_redirects: cfg.http.max_redirects,
        http_user_agent: cfg.http.user_agent.clone(),
        shell_timeout_secs: cfg.timeouts.shell_secs,
        remote_timeout_secs: cfg.timeouts.remote_secs,
    }
}

/// Logging configuration from the `[logging]` section.
///
/// # Errors
///
/// Returns an error when the level or format is not recognised.
pub fn to_log_config(cfg: &Config) -> HostResult<LogConfig> {
    Ok(LogConfig::from_section(&cfg.logging)?)
}

/// Install the global subscriber described by `[logging]`.
///
/// # Errors
///
/// Returns an error when the section is invalid or a subscriber is already
/// installed.
pub fn init_logging(cfg: &Config) -> HostResult<()> {
    setup_logging(&to_log_config(cfg)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let mut cfg = Config::default();
        cfg.ssh.pool_size = 7;
        cfg.http.allow_redirect = false;
        cfg.timeouts.remote_secs = 30;
        cfg.shell.program = "zsh".to_owned();

        let s = to_tool_settings(&cfg);
        assert_eq!(s.ssh_pool_size, 7);
        assert!(!s.http_allow_redirect);
        assert_eq!(s.remote_timeout_secs, 30);
        assert_eq!(s.shell_program, "zsh");
        assert_eq!(
            s.ssh_connect_timeout,
            Duration::from_secs(cfg.ssh.connect_timeout_secs)
        );
    }

    #[test]
    fn test_default_logging_section_converts() {
        assert!(to_log_config(&Config::default()).is_ok());
    }
}
