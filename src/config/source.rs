use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Event source behaviour
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SourceConfig {
    /// Period of full resync notifications (milliseconds), 0 disables it
    #[serde(default)]
    pub resync_period_ms: u64,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resync_period_ms > 0 && self.resync_period_ms < 1000 {
            return Err(Error::InvalidConfig(format!(
                "source.resync_period_ms {} is below the 1000ms minimum",
                self.resync_period_ms
            )));
        }
        Ok(())
    }

    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_ms > 0).then(|| Duration::from_millis(self.resync_period_ms))
    }
}
