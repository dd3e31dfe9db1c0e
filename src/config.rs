use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Registry Configuration
// ============================================================================
//
// Defaults are usable as-is. A JSON file named by DEVICE_REGISTRY_CONFIG is
// layered on top, then individual environment overrides.
//
// ============================================================================

pub const CONFIG_PATH_ENV: &str = "DEVICE_REGISTRY_CONFIG";
pub const QUERY_TIMEOUT_ENV: &str = "DEVICE_REGISTRY_QUERY_TIMEOUT_MS";
pub const METRICS_PORT_ENV: &str = "DEVICE_REGISTRY_METRICS_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Query timeout must be greater than zero")]
    ZeroQueryTimeout,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Default deadline for a group query, in milliseconds
    pub query_timeout_ms: u64,
    /// Serve Prometheus metrics over HTTP
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 3_000,
            metrics_enabled: true,
            metrics_port: 9090,
            log_filter: "info,device_registry=debug".to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Load configuration from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the process environment
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(raw) = lookup(QUERY_TIMEOUT_ENV) {
            config.query_timeout_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: QUERY_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = lookup(METRICS_PORT_ENV) {
            config.metrics_port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: METRICS_PORT_ENV,
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Loaded registry config file");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::ZeroQueryTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::load_with(env(&[])).unwrap();
        assert_eq!(config.query_timeout(), Duration::from_secs(3));
        assert_eq!(config.metrics_port, 9090);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = RegistryConfig::load_with(env(&[
            (QUERY_TIMEOUT_ENV, "250"),
            (METRICS_PORT_ENV, "9191"),
        ]))
        .unwrap();

        assert_eq!(config.query_timeout(), Duration::from_millis(250));
        assert_eq!(config.metrics_port, 9191);
    }

    #[test]
    fn test_invalid_env_value() {
        let result = RegistryConfig::load_with(env(&[(QUERY_TIMEOUT_ENV, "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { key: QUERY_TIMEOUT_ENV, .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = RegistryConfig::load_with(env(&[(QUERY_TIMEOUT_ENV, "0")]));
        assert!(matches!(result, Err(ConfigError::ZeroQueryTimeout)));
    }

    #[test]
    fn test_partial_json_file() {
        let path = std::env::temp_dir().join(format!(
            "device_registry_config_{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, r#"{ "query_timeout_ms": 500, "metrics_enabled": false }"#).unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = RegistryConfig::load_with(env(&[(CONFIG_PATH_ENV, path_str.as_str())])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.query_timeout_ms, 500);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_missing_file() {
        let result = RegistryConfig::load_with(env(&[(CONFIG_PATH_ENV, "/nonexistent/registry.json")]));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
