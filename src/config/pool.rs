use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolConfig {
    /// Grace period before a retired pool's members are closed
    #[serde(default = "default_close_grace_secs")]
    pub close_grace_secs: u64,

    /// Upper bound for a single member liveness probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            close_grace_secs: default_close_grace_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(invalid("pool.probe_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn default_close_grace_secs() -> u64 {
    30
}
fn default_probe_timeout_ms() -> u64 {
    2000
}
