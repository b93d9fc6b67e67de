use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Rate limiting applied when a failed key is re-queued
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay after the first failure (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Sustained re-queue rate across all keys
    #[serde(default = "default_bucket_qps")]
    pub bucket_qps: u32,

    /// Re-queues allowed in a burst before `bucket_qps` applies
    #[serde(default = "default_bucket_burst")]
    pub bucket_burst: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            bucket_qps: default_bucket_qps(),
            bucket_burst: default_bucket_burst(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::InvalidConfig("retry.base_delay_ms must be greater than 0".into()));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "retry.max_delay_ms ({}) must be >= retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        if self.bucket_qps == 0 || self.bucket_burst == 0 {
            return Err(Error::InvalidConfig(
                "retry.bucket_qps and retry.bucket_burst must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn default_base_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    1_000_000
}
fn default_bucket_qps() -> u32 {
    10
}
fn default_bucket_burst() -> u32 {
    100
}
