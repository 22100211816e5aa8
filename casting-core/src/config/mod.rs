mod loader;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from a YAML file, `.env` files, and
/// environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml`
/// 2. `.env` file (loaded into process environment, never overwriting)
/// 3. Environment variables (`AUTH0_DOMAIN` overrides `auth0.domain`)
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration from the current working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("application.yaml"))
    }

    /// Load configuration with an explicit YAML file path.
    pub fn load_from(yaml_path: &Path) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        loader::load_yaml_file(yaml_path, &mut values)?;

        // .env never overwrites variables that are already set
        let _ = dotenvy::dotenv();

        for (env_key, env_val) in std::env::vars() {
            values.insert(loader::env_key_to_config_key(&env_key), env_val);
        }

        Ok(AppConfig { values })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(AppConfig { values })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Get the raw string value for a dot-separated key.
    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    /// Get a value parsed with [`FromStr`].
    pub fn get_parsed<V: FromStr>(&self, key: &str) -> Result<V, ConfigError> {
        let raw = self.get_str(key)?;
        raw.trim().parse().map_err(|_| ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<V>(),
        })
    }

    /// Get a parsed value, returning a default if the key is missing.
    ///
    /// A present but unparsable value is still an error.
    pub fn get_or<V: FromStr>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.get_parsed(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    /// Get a comma-separated list. Empty items are dropped.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .get_str(key)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
