//! Configuration management for the synchronizer.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the JSON store file.
pub const STORE_PATH_VAR: &str = "TRACESYNC_STORE_PATH";
/// Environment variable for the delay before the initial fetch, in milliseconds.
pub const INITIAL_DELAY_VAR: &str = "TRACESYNC_INITIAL_DELAY_MS";
/// Environment variable bounding each remote call, in milliseconds.
pub const REMOTE_TIMEOUT_VAR: &str = "TRACESYNC_REMOTE_TIMEOUT_MS";

const DEFAULT_STORE_PATH: &str = "tracesync.json";

/// Synchronizer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizerConfig {
    /// Path of the JSON file backing the file remote
    pub store_path: PathBuf,
    /// Wait before the initial fetch
    pub initial_delay: Duration,
    /// Upper bound for a single fetch or push; `None` waits forever
    pub remote_timeout: Option<Duration>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            initial_delay: Duration::ZERO,
            remote_timeout: None,
        }
    }
}

impl SynchronizerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_path = lookup(STORE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        let initial_delay = parse_millis(INITIAL_DELAY_VAR, lookup(INITIAL_DELAY_VAR))?
            .unwrap_or(Duration::ZERO);

        let remote_timeout = parse_millis(REMOTE_TIMEOUT_VAR, lookup(REMOTE_TIMEOUT_VAR))?;

        Ok(Self {
            store_path,
            initial_delay,
            remote_timeout,
        })
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }
}

fn parse_millis(var: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidDuration { var, value: raw }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var} value: {value:?} (expected milliseconds)")]
    InvalidDuration { var: &'static str, value: String },
}
