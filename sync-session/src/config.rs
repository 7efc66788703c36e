//! Session configuration.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so
//! an empty file (or no file at all) yields a working session.
//!
//! ```toml
//! [retry]
//! max_retries = 3
//! base_delay_ms = 1000
//! max_delay_ms = 60000
//!
//! [split]
//! max_depth = 8
//!
//! [logging]
//! log_events = true
//! ```

use cloudsync_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Root configuration for a sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Batch splitting configuration.
    #[serde(default)]
    pub split: SplitConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retry configuration for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries per work before the session halts (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any retry delay in milliseconds (default: 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Batch splitting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// How many times a modify batch may be halved (default: 8).
    #[serde(default = "default_max_split_depth")]
    pub max_depth: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Install the event logging middleware (default: true).
    #[serde(default = "default_log_events")]
    pub log_events: bool,
}

// Default value functions
fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_split_depth() -> u32 {
    8
}

fn default_log_events() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_split_depth(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_events: default_log_events(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values make sense together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) must be at least retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        Ok(())
    }

    /// The retry and split limits handed to the state machine.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_split_depth: self.split.max_depth,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse config file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Values parsed but are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_default_policy() {
        let config = SessionConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.logging.log_events);
        config.validate().unwrap();
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[retry]
max_retries = 5
base_delay_ms = 250
max_delay_ms = 10000

[split]
max_depth = 4

[logging]
log_events = false
"#;
        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.split.max_depth, 4);
        assert!(!config.logging.log_events);

        let policy = config.retry_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.max_split_depth, 4);
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let config: SessionConfig = toml::from_str("[retry]\nmax_retries = 1\n").unwrap();
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.split.max_depth, 8);
        assert!(config.logging.log_events);
    }

    #[test]
    fn empty_config_is_default() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn serialized_config_parses_back() {
        let config = SessionConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[retry]"));
        assert_eq!(toml::from_str::<SessionConfig>(&text).unwrap(), config);
    }

    #[test]
    fn validate_rejects_zero_base_delay() {
        let mut config = SessionConfig::default();
        config.retry.base_delay_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let mut config = SessionConfig::default();
        config.retry.max_delay_ms = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_delay_ms"));
    }

    #[test]
    fn from_file_loads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[split]\nmax_depth = 2").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.split.max_depth, 2);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_retries = \"many\"").unwrap();

        let err = SessionConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
