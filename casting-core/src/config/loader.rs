use std::collections::HashMap;
use std::path::Path;

use super::ConfigError;

/// Load and parse a YAML file, flattening it into the values map.
/// A missing file is not an error.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, String>,
) -> Result<(), ConfigError> {
    if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        load_yaml_str(&content, values)?;
    }
    Ok(())
}

/// Parse a YAML string and flatten it into the values map.
pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, String>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys.
///
/// Sequences of scalars are joined with commas so that `auth0.algorithms: [RS256]`
/// and `AUTH0_ALGORITHMS=RS256` read the same way.
pub(crate) fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key_str = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => scalar_to_string(other).unwrap_or_else(|| format!("{other:?}")),
                };
                let full_key = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            if !prefix.is_empty() {
                let joined = seq
                    .iter()
                    .filter_map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                out.insert(prefix.to_string(), joined);
            }
        }
        leaf => {
            if let (false, Some(s)) = (prefix.is_empty(), scalar_to_string(leaf)) {
                out.insert(prefix.to_string(), s);
            }
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert an environment variable name to its config key.
/// Convention: `AUTH0_JWKS_URL` <-> `auth0.jwks.url`.
pub(crate) fn env_key_to_config_key(env_key: &str) -> String {
    env_key.to_lowercase().replace('_', ".")
}
