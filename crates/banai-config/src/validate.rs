//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for `ssh.pool_size`.
pub const MAX_POOL_SIZE: usize = 64;
/// Upper bound for `ssh.connect_timeout_secs`.
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 300;
/// Upper bound for `docker.stop_grace_secs`.
pub const MAX_STOP_GRACE_SECS: u64 = 600;
/// Upper bound for `http.timeout_secs`.
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 3600;

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::ValidationError`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_shell(config)?;
    validate_ssh(config)?;
    validate_docker(config)?;
    validate_http(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_shell(config: &Config) -> ConfigResult<()> {
    if config.shell.program.trim().is_empty() {
        return Err(invalid("shell.program", "must not be empty"));
    }
    if config.shell.fallback.trim().is_empty() {
        return Err(invalid("shell.fallback", "must not be empty"));
    }
    Ok(())
}

fn validate_ssh(config: &Config) -> ConfigResult<()> {
    let ssh = &config.ssh;
    if !(1..=MAX_POOL_SIZE).contains(&ssh.pool_size) {
        return Err(invalid(
            "ssh.pool_size",
            format!("must be between 1 and {MAX_POOL_SIZE}, got {}", ssh.pool_size),
        ));
    }
    if !(1..=MAX_CONNECT_TIMEOUT_SECS).contains(&ssh.connect_timeout_secs) {
        return Err(invalid(
            "ssh.connect_timeout_secs",
            format!(
                "must be between 1 and {MAX_CONNECT_TIMEOUT_SECS}, got {}",
                ssh.connect_timeout_secs
            ),
        ));
    }
    if ssh.default_port == 0 {
        return Err(invalid("ssh.default_port", "must not be 0"));
    }
    Ok(())
}

fn validate_docker(config: &Config) -> ConfigResult<()> {
    let docker = &config.docker;
    if docker.stop_grace_secs > MAX_STOP_GRACE_SECS {
        return Err(invalid(
            "docker.stop_grace_secs",
            format!(
                "must be at most {MAX_STOP_GRACE_SECS}, got {}",
                docker.stop_grace_secs
            ),
        ));
    }
    if docker.timeout_secs == 0 {
        return Err(invalid("docker.timeout_secs", "must be at least 1"));
    }
    if docker.socket.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(invalid("docker.socket", "must not be empty when set"));
    }
    Ok(())
}

fn validate_http(config: &Config) -> ConfigResult<()> {
    if config.http.timeout_secs > MAX_HTTP_TIMEOUT_SECS {
        return Err(invalid(
            "http.timeout_secs",
            format!(
                "must be at most {MAX_HTTP_TIMEOUT_SECS}, got {}",
                config.http.timeout_secs
            ),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let logging = &config.logging;
    if !matches!(
        logging.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected trace, debug, info, warn, error or off",
                logging.level
            ),
        ));
    }
    if !matches!(
        logging.format.as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected pretty, compact, json or full",
                logging.format
            ),
        ));
    }
    Ok(())
}
