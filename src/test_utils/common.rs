use std::time::Duration;

use crate::PoolConfig;
use crate::WatchConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Watch tuning with short retry pauses so soft restarts settle quickly
pub fn test_watch_config() -> WatchConfig {
    WatchConfig {
        channel_capacity: 16,
        restart_interval_secs: 30,
        retry_delay_ms: 10,
        soft_restart_escalation: 3,
    }
}

pub fn test_pool_config(close_grace_secs: u64) -> PoolConfig {
    PoolConfig {
        close_grace_secs,
        probe_timeout_ms: 500,
    }
}

/// Upper bound for any single wait in async tests
pub const TEST_WAIT: Duration = Duration::from_secs(3);
