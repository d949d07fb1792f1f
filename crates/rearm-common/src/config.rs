//! Configuration for the timer and its watchdog.
//!
//! Supports TOML deserialization with humantime durations. The two periods
//! are the only parameters that change the protocol's behaviour.

use crate::error::{TimerError, TimerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Longest accepted period for either loop.
///
/// Loop deadlines are `Instant`s; this keeps `now + period` far from the
/// platform's `Instant` range limit.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Check that `period` is usable as a loop period.
///
/// # Errors
///
/// Returns [`TimerError::Config`] if `period` is zero or longer than
/// [`MAX_PERIOD`].
pub fn check_period(what: &str, period: Duration) -> TimerResult<()> {
    if period.is_zero() {
        return Err(TimerError::Config(format!("{what} must be greater than 0")));
    }
    if period > MAX_PERIOD {
        return Err(TimerError::Config(format!(
            "{what} of {} exceeds the maximum of {}",
            humantime::format_duration(period),
            humantime::format_duration(MAX_PERIOD)
        )));
    }
    Ok(())
}

/// Top-level timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Label attached to every log event of this timer.
    pub name: String,

    /// Period of the executor loop that fires the timer.
    #[serde(with = "humantime_serde")]
    pub executor_period: Duration,

    /// Period of the watchdog loop that rearms the timer.
    #[serde(with = "humantime_serde")]
    pub watchdog_period: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            name: String::from("minimal_timer"),
            executor_period: Duration::from_millis(500),
            watchdog_period: Duration::from_millis(1000),
        }
    }
}

impl TimerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject configurations that must not reach either loop.
    ///
    /// A watchdog faster than the executor is accepted but logged: the
    /// watchdog then mostly observes an armed timer.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] for a zero or out-of-range period, or
    /// an empty name.
    pub fn validate(&self) -> TimerResult<()> {
        check_period("executor_period", self.executor_period)?;
        check_period("watchdog_period", self.watchdog_period)?;
        if self.name.trim().is_empty() {
            return Err(TimerError::Config("name must not be empty".into()));
        }
        if self.watchdog_period < self.executor_period {
            warn!(
                executor_period_ms = self.executor_period.as_millis(),
                watchdog_period_ms = self.watchdog_period.as_millis(),
                "Watchdog period is shorter than executor period; \
                 expect repeated still-armed observations"
            );
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
