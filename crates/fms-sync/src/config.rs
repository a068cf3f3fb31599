//! Engine configuration.

use fms_provider::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::review::ReviewPolicy;

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard limit on the whole fetch step, retries included.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Hard limit on building the provider and probing the connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Retry policy for transient provider failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Which changes need human review.
    #[serde(default)]
    pub review_policy: ReviewPolicy,
    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry: RetryConfig::default(),
            review_policy: ReviewPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Unparseable values fall back to the default as well.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fetch_timeout_secs: env_parse("FMS_SYNC_FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            connect_timeout_secs: env_parse("FMS_SYNC_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
            retry: RetryConfig {
                max_retries: env_parse("FMS_SYNC_MAX_RETRIES")
                    .unwrap_or(defaults.retry.max_retries),
                initial_delay_ms: env_parse("FMS_SYNC_RETRY_INITIAL_DELAY_MS")
                    .unwrap_or(defaults.retry.initial_delay_ms),
                ..defaults.retry
            },
            review_policy: defaults.review_policy,
            event_capacity: env_parse("FMS_SYNC_EVENT_CAPACITY")
                .unwrap_or(defaults.event_capacity),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(SyncError::configuration("fetch_timeout_secs must be positive"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(SyncError::configuration(
                "connect_timeout_secs must be positive",
            ));
        }
        if self.event_capacity == 0 {
            return Err(SyncError::configuration("event_capacity must be positive"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(SyncError::configuration(
                "retry.backoff_multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }

    /// Fetch timeout as a `Duration`.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
