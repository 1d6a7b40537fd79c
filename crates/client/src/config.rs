//! Client configuration via `docfeed-client.toml`
//!
//! ```toml
//! poll_timeout_ms = 50000
//! poll_error_backoff_ms = 1000
//!
//! [retry]
//! initial_delay_ms = 20
//! multiplier = 1.2
//! max_attempts = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Config file name for the client
pub const CLIENT_CONFIG_FILE_NAME: &str = "docfeed-client.toml";

// =============================================================================
// RetryPolicy
// =============================================================================

/// Backoff policy for optimistic updates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry (unit: milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor applied to the delay after every retry
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum number of attempts (0 means unlimited attempts)
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    20
}

fn default_multiplier() -> f64 {
    1.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: 0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never gives up (the default)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Same delays, capped at `max_attempts`
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// True once `attempts` attempts have been made and the cap forbids another
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// Fresh delay sequence for one update
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_ms: self.initial_delay_ms as f64,
            multiplier: self.multiplier,
        }
    }

    /// Reject a multiplier below 1.0 or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ClientError::Config(format!(
                "retry multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Exponentially growing delays: `initial, initial * m, initial * m^2, ...`
///
/// Growth is unbounded; a delay too large to represent saturates at
/// `Duration::MAX`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next_ms: f64,
    multiplier: f64,
}

impl Backoff {
    /// Next delay in the sequence
    pub fn next_delay(&mut self) -> Duration {
        let nanos = (self.next_ms * 1_000_000.0).round();
        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::MAX
        };
        self.next_ms *= self.multiplier;
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Client configuration loaded from `docfeed-client.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Optimistic update backoff
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Timeout requested on every background poll (unit: milliseconds)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Pause after a failed background poll (unit: milliseconds)
    #[serde(default = "default_poll_error_backoff_ms")]
    pub poll_error_backoff_ms: u64,
}

fn default_poll_timeout_ms() -> u64 {
    50_000
}

fn default_poll_error_backoff_ms() -> u64 {
    1_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_error_backoff_ms: default_poll_error_backoff_ms(),
        }
    }
}

impl ClientConfig {
    /// Background poll timeout
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Pause after a failed poll
    pub fn poll_error_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_error_backoff_ms)
    }

    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docfeed client configuration
#
# Timeout requested on every background poll, in milliseconds.
poll_timeout_ms = 50000

# Pause after a failed background poll, in milliseconds.
poll_error_backoff_ms = 1000

# Optimistic update backoff: initial_delay_ms, then multiplied by
# `multiplier` after every conflict. max_attempts = 0 retries forever.
[retry]
initial_delay_ms = 20
multiplier = 1.2
max_attempts = 0
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                ClientError::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
