//! Configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Engine tunables (`StudioConfig`) always resolve: every knob falls back to
//! a typed default when its variable is absent or unparseable. Remote
//! endpoint settings (`RemoteConfig`) have a required base URL and fail
//! loudly without it.

use std::path::PathBuf;
use std::time::Duration;

use canvas::consts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PADDING};

use crate::error::ErrorCode;

pub const DEFAULT_DATA_DIR: &str = ".studio";
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 300;
pub const DEFAULT_DRAIN_DELAY_MS: u64 = 100;
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_DELETE_SETTLE_MS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("env var {var} names {target}, which is not set")]
    MissingIndirect { var: &'static str, target: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_CONFIG_MISSING",
            Self::MissingIndirect { .. } => "E_CONFIG_MISSING_INDIRECT",
        }
    }
}

// =============================================================================
// ENGINE TUNABLES
// =============================================================================

/// Timing, concurrency, and placement knobs for the engine.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Directory holding the durable task queue and clipboard files.
    pub data_dir: PathBuf,
    /// Upper bound on simultaneously active pollers.
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    /// Pause between a poller settling and the next drain cycle.
    pub drain_delay: Duration,
    /// Trailing-edge debounce for view and item persistence.
    pub sync_debounce: Duration,
    /// How long items sit in the deleting state before the remote delete.
    pub delete_settle: Duration,
    pub placement_padding: f64,
    pub placement_max_attempts: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            drain_delay: Duration::from_millis(DEFAULT_DRAIN_DELAY_MS),
            sync_debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            delete_settle: Duration::from_millis(DEFAULT_DELETE_SETTLE_MS),
            placement_padding: DEFAULT_PADDING,
            placement_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl StudioConfig {
    /// Build engine config from environment variables.
    ///
    /// - `STUDIO_DATA_DIR` (default `.studio`)
    /// - `STUDIO_MAX_CONCURRENT` (default 3, minimum 1)
    /// - `STUDIO_POLL_INTERVAL_MS` (default 2000)
    /// - `STUDIO_POLL_MAX_ATTEMPTS` (default 300)
    /// - `STUDIO_DRAIN_DELAY_MS` (default 100)
    /// - `STUDIO_SYNC_DEBOUNCE_MS` (default 500)
    /// - `STUDIO_DELETE_SETTLE_MS` (default 300)
    /// - `STUDIO_PLACEMENT_PADDING` (default 12)
    /// - `STUDIO_PLACEMENT_MAX_ATTEMPTS` (default 100)
    #[must_use]
    pub fn from_env() -> Self {
        let data_dir = std::env::var("STUDIO_DATA_DIR").map_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);
        Self {
            data_dir,
            max_concurrent: env_parse("STUDIO_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT).max(1),
            poll_interval: Duration::from_millis(env_parse("STUDIO_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            poll_max_attempts: env_parse("STUDIO_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS),
            drain_delay: Duration::from_millis(env_parse("STUDIO_DRAIN_DELAY_MS", DEFAULT_DRAIN_DELAY_MS)),
            sync_debounce: Duration::from_millis(env_parse("STUDIO_SYNC_DEBOUNCE_MS", DEFAULT_SYNC_DEBOUNCE_MS)),
            delete_settle: Duration::from_millis(env_parse("STUDIO_DELETE_SETTLE_MS", DEFAULT_DELETE_SETTLE_MS)),
            placement_padding: env_parse("STUDIO_PLACEMENT_PADDING", DEFAULT_PADDING),
            placement_max_attempts: env_parse("STUDIO_PLACEMENT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
        }
    }

    #[must_use]
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("task-queue.json")
    }

    #[must_use]
    pub fn clipboard_path(&self) -> PathBuf {
        self.data_dir.join("clipboard.json")
    }
}

// =============================================================================
// REMOTE ENDPOINT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl RemoteConfig {
    /// Build remote API config from environment variables.
    ///
    /// Required:
    /// - `STUDIO_API_BASE_URL`
    ///
    /// Optional:
    /// - `STUDIO_API_TOKEN_ENV`: names the env var holding a bearer token
    /// - `STUDIO_HTTP_TIMEOUT_SECS`: default 30
    /// - `STUDIO_HTTP_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns `Missing` without a base URL, and `MissingIndirect` when the
    /// token variable names an unset variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("STUDIO_API_BASE_URL")
            .map_err(|_| ConfigError::Missing("STUDIO_API_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();

        let api_token = match std::env::var("STUDIO_API_TOKEN_ENV") {
            Ok(target) => {
                let token = std::env::var(&target)
                    .map_err(|_| ConfigError::MissingIndirect { var: "STUDIO_API_TOKEN_ENV", target: target.clone() })?;
                Some(token)
            }
            Err(_) => None,
        };

        Ok(Self {
            base_url,
            api_token,
            request_timeout: Duration::from_secs(env_parse("STUDIO_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse(
                "STUDIO_HTTP_CONNECT_TIMEOUT_SECS",
                DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
            )),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
