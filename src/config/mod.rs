//! Coordinator configuration
//!
//! Three layers, later layers winning:
//! 1. Built-in defaults
//! 2. TOML file (explicit path, or `STANDIN_CONFIG`)
//! 3. Programmatic overrides

mod defaults;
mod merge;

pub use defaults::{DEFAULT_REPLY_TIMEOUT_MS, DEFAULT_THREAD_NAME, MAX_REPLY_TIMEOUT_MS};
pub use merge::{overlay, toml_to_json};

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "STANDIN_CONFIG";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Coordinator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a caller waits for a reply before failing fast
    pub reply_timeout_ms: u64,
    /// Name given to the coordinator thread
    pub thread_name: String,
    /// Whether served calls are recorded in the ledger
    pub record_calls: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            record_calls: true,
        }
    }
}

impl CoordinatorConfig {
    /// Merge defaults, an optional TOML file and optional overrides, then validate
    pub fn build(file: Option<&Path>, overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut merged = defaults::builtin_layer();

        if let Some(path) = file {
            overlay(&mut merged, Self::load_toml(path)?);
        }
        if let Some(overrides) = overrides {
            overlay(&mut merged, overrides);
        }

        let config: Self =
            serde_json::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from the file named by `STANDIN_CONFIG`, or defaults if unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::build(Some(Path::new(&path)), None),
            None => Self::build(None, None),
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reply_timeout_ms == 0 || self.reply_timeout_ms > MAX_REPLY_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "reply_timeout_ms must be in 1..={}, got {}",
                MAX_REPLY_TIMEOUT_MS, self.reply_timeout_ms
            )));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn load_toml(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let parsed: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))?;
        Ok(toml_to_json(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::build(None, None).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.reply_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reply_timeout_ms = 250\nthread_name = \"mocks\"").unwrap();

        let config = CoordinatorConfig::build(
            Some(file.path()),
            Some(json!({"thread_name": "override"})),
        )
        .unwrap();

        assert_eq!(config.reply_timeout_ms, 250);
        assert_eq!(config.thread_name, "override");
        assert!(config.record_calls);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = CoordinatorConfig::build(None, Some(json!({"reply_timeout_ms": 0}))).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reply_timeout_ms = ").unwrap();

        let err = CoordinatorConfig::build(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CoordinatorConfig::build(Some(Path::new("/nonexistent/standin.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_wrong_type() {
        let err = CoordinatorConfig::build(None, Some(json!({"record_calls": "yes"}))).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
