//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/banai/config.toml` (system)
//! 3. Merge `~/.banai/config.toml`, or `BANAI_HOME/config.toml` (user)
//! 4. Merge `{workspace}/.banai/config.toml` (workspace)
//! 5. Apply `BANAI_*` env fallbacks for fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ExplicitFields, deep_merge};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A validated configuration plus the files it was built from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Config files that were found and merged, in load order.
    pub loaded_files: Vec<PathBuf>,
}

/// Load configuration with layered file precedence.
///
/// `home_override` replaces user-level discovery: the path is treated as the
/// `.banai` directory itself.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// or if the merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    load_with_env(workspace_root, home_override, &collect_env_vars())
}

pub(crate) fn load_with_env(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut explicit = ExplicitFields::new();
    let mut loaded_files = Vec::new();

    let mut layers = vec![PathBuf::from("/etc/banai/config.toml")];
    layers.push(user_config_path(home_override, env_vars)?);
    if let Some(root) = workspace_root {
        layers.push(root.join(".banai").join("config.toml"));
    }

    for path in layers {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay, "", &mut explicit);
            info!(path = %path.display(), "loaded config");
            loaded_files.push(path);
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &explicit, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a single file (no layering, no env fallbacks).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

fn user_config_path(
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<PathBuf> {
    if let Some(dir) = home_override {
        return Ok(dir.join("config.toml"));
    }
    if let Some(raw) = env_vars.get("BANAI_HOME") {
        match PathBuf::from(raw).canonicalize() {
            Ok(dir) if dir.is_dir() => return Ok(dir.join("config.toml")),
            _ => warn!(path = %raw, "BANAI_HOME is not a directory; ignoring"),
        }
    }
    let home = directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".banai").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.shell.program, "bash");
        assert_eq!(config.ssh.pool_size, 4);
        assert_eq!(config.docker.stop_grace_secs, 10);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_user_and_workspace_layers() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[ssh]\npool_size = 8\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join(".banai")).unwrap();
        std::fs::write(
            ws.path().join(".banai").join("config.toml"),
            "[ssh]\npool_size = 2\n",
        )
        .unwrap();

        let resolved =
            load_with_env(Some(ws.path()), Some(home.path()), &HashMap::new()).unwrap();
        assert_eq!(resolved.config.ssh.pool_size, 2);
        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn test_env_fallback_only_for_unset_fields() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();

        let mut env = HashMap::new();
        env.insert("BANAI_LOG_LEVEL".to_owned(), "debug".to_owned());
        env.insert("BANAI_SHELL".to_owned(), "zsh".to_owned());

        let resolved = load_with_env(None, Some(home.path()), &env).unwrap();
        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.config.shell.program, "zsh");
    }

    #[test]
    fn test_invalid_layer_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[ssh]\npool_size = 0\n").unwrap();

        let result = load_with_env(None, Some(home.path()), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[ssh\npool_size = ").unwrap();

        let result = load_with_env(None, Some(home.path()), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/banai.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
