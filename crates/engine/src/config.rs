//! Store configuration via `docfeed.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! reference behavior. Edit the file and reopen the store to change settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config file name placed next to the store's data
pub const CONFIG_FILE_NAME: &str = "docfeed.toml";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("config file '{path}': {reason}")]
    Io {
        /// File path
        path: String,
        /// OS error message
        reason: String,
    },

    /// File content is not valid TOML for this config
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A setting is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Store configuration loaded from `docfeed.toml`.
///
/// # Example
///
/// ```toml
/// patch_log_capacity = 20
/// default_poll_timeout_ms = 50000
/// max_poll_timeout_ms = 300000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Patches retained per document; older entries are dropped.
    #[serde(default = "default_patch_log_capacity")]
    pub patch_log_capacity: usize,
    /// Poll timeout used when the caller does not supply one.
    #[serde(default = "default_poll_timeout_ms")]
    pub default_poll_timeout_ms: u64,
    /// Upper bound applied to caller-supplied poll timeouts.
    #[serde(default = "default_max_poll_timeout_ms")]
    pub max_poll_timeout_ms: u64,
}

fn default_patch_log_capacity() -> usize {
    20
}

fn default_poll_timeout_ms() -> u64 {
    50_000
}

fn default_max_poll_timeout_ms() -> u64 {
    300_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            patch_log_capacity: default_patch_log_capacity(),
            default_poll_timeout_ms: default_poll_timeout_ms(),
            max_poll_timeout_ms: default_max_poll_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the patch log capacity is zero or the
    /// default poll timeout exceeds the maximum.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.patch_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "patch_log_capacity must be at least 1".to_string(),
            ));
        }
        if self.default_poll_timeout_ms > self.max_poll_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "default_poll_timeout_ms ({}) exceeds max_poll_timeout_ms ({})",
                self.default_poll_timeout_ms, self.max_poll_timeout_ms
            )));
        }
        Ok(())
    }

    /// Effective timeout for a poll: the requested one clamped to the
    /// maximum, or the default.
    pub fn poll_timeout(&self, requested: Option<Duration>) -> Duration {
        let max = Duration::from_millis(self.max_poll_timeout_ms);
        match requested {
            Some(timeout) => timeout.min(max),
            None => Duration::from_millis(self.default_poll_timeout_ms),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docfeed store configuration
#
# Patches retained per document (default: 20, minimum 1).
# A watcher further behind than this receives only the retained suffix.
patch_log_capacity = 20

# Poll timeout when the caller does not supply one, in milliseconds.
default_poll_timeout_ms = 50000

# Caller-supplied poll timeouts are clamped to this, in milliseconds.
max_poll_timeout_ms = 300000
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
