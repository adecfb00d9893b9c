//! Configuration for the [`SyncRuntime`](crate::SyncRuntime).
//!
//! ```toml
//! [logging]
//! install_subscriber = true
//! filter = "foundation_sync=debug,info"
//! json = false
//! ```

use derive_more::derive::From;
use serde::{Deserialize, Serialize};

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    InvalidPath(std::path::PathBuf),

    /// The logging filter is not a valid `EnvFilter` directive.
    #[from(ignore)]
    InvalidFilter(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install a global `tracing` subscriber during `init`. An already
    /// installed global subscriber is always left in place.
    pub install_subscriber: bool,

    /// `EnvFilter` directive, e.g. `"foundation_sync=debug,info"`.
    pub filter: String,

    /// Emit JSON lines instead of the human readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            install_subscriber: false,
            filter: String::from("info"),
            json: false,
        }
    }
}

impl SyncConfig {
    /// Loads the configuration from a toml file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] when `target` is not a file, and
    /// the io or deserialization error otherwise.
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<Self> {
        let target_path = target.into();
        if !target_path.is_file() {
            return Err(ConfigError::InvalidPath(target_path));
        }
        let config_content = std::fs::read_to_string(target_path)?;
        Self::from_toml_str(&config_content)
    }

    /// Parses the configuration from toml text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationFailed`] on malformed toml.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SyncConfig::from_toml_str("").expect("should parse");
        assert_eq!(config, SyncConfig::default());
        assert!(!config.logging.install_subscriber);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_logging_table() {
        let config = SyncConfig::from_toml_str(
            r#"
            [logging]
            install_subscriber = true
            json = true
            "#,
        )
        .expect("should parse");

        assert!(config.logging.install_subscriber);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let result = SyncConfig::from_toml_str("[logging\nfilter = 3");
        assert!(matches!(result, Err(ConfigError::DeserializationFailed(_))));
    }

    #[test]
    fn test_missing_file_is_invalid_path() {
        let result = SyncConfig::from_path("/definitely/not/here/sync.toml");
        assert!(matches!(result, Err(ConfigError::InvalidPath(_))));
    }
}
