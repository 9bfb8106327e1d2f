use std::collections::HashMap;

use tracing::debug;

use crate::merge::ExplicitFields;

/// Environment variables consulted for fields no config file has set.
pub const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("BANAI_SECRETS_FILE", "secrets.file"),
    ("BANAI_LOG_LEVEL", "logging.level"),
    ("BANAI_DOCKER_SOCKET", "docker.socket"),
    ("BANAI_SHELL", "shell.program"),
];

/// Snapshot the `BANAI_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("BANAI_"))
        .collect()
}

/// Fill fields that no file layer set from their `BANAI_*` variable.
///
/// Empty variables are ignored. Returns the number of fields applied.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    explicit: &ExplicitFields,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for (var, field) in ENV_FALLBACKS {
        if explicit.contains(*field) {
            continue;
        }
        let Some(value) = env_vars.get(*var).filter(|v| !v.is_empty()) else {
            continue;
        };
        if set_path(merged, field, toml::Value::String(value.clone())) {
            debug!(var, field, "config field taken from environment");
            applied = applied.saturating_add(1);
        }
    }
    applied
}

fn set_path(root: &mut toml::Value, dotted: &str, value: toml::Value) -> bool {
    let mut parts: Vec<&str> = dotted.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return false;
    };
    let mut node = root;
    for part in parts {
        let Some(table) = node.as_table_mut() else {
            return false;
        };
        node = table
            .entry(part.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    match node.as_table_mut() {
        Some(table) => {
            table.insert(leaf.to_owned(), value);
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_unset_field() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"\n").unwrap();
        let count = apply_env_fallbacks(
            &mut merged,
            &ExplicitFields::new(),
            &env(&[("BANAI_LOG_LEVEL", "debug"), ("BANAI_SECRETS_FILE", "/s.json")]),
        );
        assert_eq!(count, 2);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(merged["secrets"]["file"].as_str(), Some("/s.json"));
    }

    #[test]
    fn test_file_value_wins_over_env() {
        let mut merged: toml::Value = toml::from_str("[shell]\nprogram = \"zsh\"\n").unwrap();
        let mut explicit = ExplicitFields::new();
        explicit.insert("shell.program".to_owned());

        let count = apply_env_fallbacks(&mut merged, &explicit, &env(&[("BANAI_SHELL", "fish")]));
        assert_eq!(count, 0);
        assert_eq!(merged["shell"]["program"].as_str(), Some("zsh"));
    }

    #[test]
    fn test_empty_var_ignored() {
        let mut merged: toml::Value = toml::from_str("").unwrap();
        let count = apply_env_fallbacks(
            &mut merged,
            &ExplicitFields::new(),
            &env(&[("BANAI_DOCKER_SOCKET", "")]),
        );
        assert_eq!(count, 0);
    }
}
