use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Tuning for every watch session opened by the registry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Bounded buffer between the watch loop and its consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Forced stream restart period, guards against silently missed notifications
    #[serde(default = "default_restart_interval_secs")]
    pub restart_interval_secs: u64,

    /// Pause before reopening a stream after an error
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Consecutive soft restarts after which restarts are logged as errors
    #[serde(default = "default_soft_restart_escalation")]
    pub soft_restart_escalation: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            restart_interval_secs: default_restart_interval_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            soft_restart_escalation: default_soft_restart_escalation(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(invalid("watch.channel_capacity must be > 0"));
        }
        if self.restart_interval_secs == 0 {
            return Err(invalid("watch.restart_interval_secs must be > 0"));
        }
        if self.soft_restart_escalation == 0 {
            return Err(invalid("watch.soft_restart_escalation must be > 0"));
        }
        Ok(())
    }

    pub fn restart_interval(&self) -> Duration {
        Duration::from_secs(self.restart_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_channel_capacity() -> usize {
    100
}
fn default_restart_interval_secs() -> u64 {
    30
}
fn default_retry_delay_ms() -> u64 {
    200
}
fn default_soft_restart_escalation() -> u32 {
    5
}
