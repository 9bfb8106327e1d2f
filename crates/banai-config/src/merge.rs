use std::collections::HashSet;

/// Dotted paths of every leaf a config file has set.
pub type ExplicitFields = HashSet<String>;

/// Recursively deep-merge `overlay` into `base`, recording each leaf the
/// overlay sets in `explicit`.
///
/// Tables merge per-field. Scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    explicit: &mut ExplicitFields,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val, &path, explicit);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, explicit);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            explicit.insert(prefix.to_owned());
        },
    }
}

fn record_leaves(val: &toml::Value, prefix: &str, explicit: &mut ExplicitFields) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join_path(prefix, key), explicit);
        }
    } else {
        explicit.insert(prefix.to_owned());
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
