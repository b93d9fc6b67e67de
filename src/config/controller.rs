use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Dispatcher and worker loop parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Name used for the work queue in logs and metrics
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of concurrent worker loops
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Consecutive failures tolerated before a key is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on waiting for the initial listing (milliseconds)
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,

    /// How often the has-synced predicate is polled (milliseconds)
    #[serde(default = "default_cache_sync_poll_interval_ms")]
    pub cache_sync_poll_interval_ms: u64,

    /// Deadline for a single reconcile pass (milliseconds), 0 disables it
    #[serde(default)]
    pub reconcile_timeout_ms: u64,

    /// Log file directory; logs go to stdout when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            workers: default_workers(),
            max_retries: default_max_retries(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
            cache_sync_poll_interval_ms: default_cache_sync_poll_interval_ms(),
            reconcile_timeout_ms: 0,
            log_dir: None,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("controller.name cannot be empty".into()));
        }

        if self.workers == 0 {
            return Err(Error::InvalidConfig("controller.workers must be at least 1".into()));
        }

        if self.cache_sync_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "controller.cache_sync_poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.cache_sync_timeout_ms < self.cache_sync_poll_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "controller.cache_sync_timeout_ms ({}) must not be shorter than the poll interval ({})",
                self.cache_sync_timeout_ms, self.cache_sync_poll_interval_ms
            )));
        }

        Ok(())
    }

    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_sync_timeout_ms)
    }

    pub fn cache_sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sync_poll_interval_ms)
    }

    pub fn reconcile_timeout(&self) -> Option<Duration> {
        (self.reconcile_timeout_ms > 0).then(|| Duration::from_millis(self.reconcile_timeout_ms))
    }
}

fn default_name() -> String {
    "controller".to_string()
}
fn default_workers() -> usize {
    1
}
fn default_max_retries() -> u32 {
    5
}
// in ms
fn default_cache_sync_timeout_ms() -> u64 {
    60_000
}
fn default_cache_sync_poll_interval_ms() -> u64 {
    100
}
