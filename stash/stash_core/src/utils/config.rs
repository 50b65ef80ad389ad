//! Pool configuration.
//!
//! [`PoolConfig`] is plain data: it can be built in code, deserialized with
//! serde, or loaded from a TOML file. Durations are expressed in whole
//! milliseconds on the wire (`idle_timeout_ms`, `reap_interval_ms`).
//!
//! ```
//! use stash_core::utils::config::PoolConfig;
//! use std::time::Duration;
//!
//! let config = PoolConfig::from_toml_str("idle_timeout_ms = 30000").unwrap();
//! assert_eq!(config.idle_timeout, Duration::from_secs(30));
//! assert_eq!(config.reap_interval, Duration::from_secs(90));
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default period between reaper sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(90);

/// Default name of the reaper thread.
pub const DEFAULT_REAPER_THREAD_NAME: &str = "stash-reaper";

/// Configuration for a resource pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// How long a resource may sit idle before the reaper evicts it
    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle_timeout: Duration,

    /// How often the reaper sweeps the idle registry
    #[serde(rename = "reap_interval_ms", with = "millis")]
    pub reap_interval: Duration,

    /// Name given to the reaper thread
    pub reaper_thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
            reaper_thread_name: DEFAULT_REAPER_THREAD_NAME.to_string(),
        }
    }
}

impl PoolConfig {
    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the reaper sweep interval.
    pub fn with_reap_interval(mut self, reap_interval: Duration) -> Self {
        self.reap_interval = reap_interval;
        self
    }

    /// Set the reaper thread name.
    pub fn with_reaper_thread_name(mut self, name: impl Into<String>) -> Self {
        self.reaper_thread_name = name.into();
        self
    }

    /// Parse and validate a configuration from TOML text.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file in TOML format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check that every value is usable.
    ///
    /// Zero durations are rejected (a zero reap interval would spin the
    /// reaper), as are thread names the OS cannot accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.reap_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "reap_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.reaper_thread_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "reaper_thread_name",
                reason: "must not be empty".to_string(),
            });
        }

        if self.reaper_thread_name.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "reaper_thread_name",
                reason: "must not contain NUL bytes".to_string(),
            });
        }

        Ok(())
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // TOML integers are signed 64-bit
        const MAX_MS: u64 = i64::MAX as u64;
        let ms = u64::try_from(duration.as_millis()).map_or(MAX_MS, |ms| ms.min(MAX_MS));
        serializer.serialize_u64(ms)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
