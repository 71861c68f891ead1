//! Configuration management module for the hot-reload runtime.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Optional `config/hotpool.toml`
//! 3. Explicit config file (argument or `HOTPOOL_CONFIG`)
//! 4. Environment variables (highest priority)
//!

mod log;
mod pool;
mod retry;
mod static_pools;
mod store;
mod watch;
pub use log::*;
pub use pool::*;
pub use retry::*;
pub use static_pools::*;
pub use store::*;
pub use watch::*;


//---
use crate::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde::Serialize;
use std::env;

/// Env var naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "HOTPOOL_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Deployment environment
    #[serde(default)]
    pub env: RunEnvironment,
    /// Log filter settings
    #[serde(default)]
    pub log: LogConfig,
    /// External store connection settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Watch loop tuning
    #[serde(default)]
    pub watch: WatchConfig,
    /// Pool manager tuning
    #[serde(default)]
    pub pool: PoolConfig,
    /// Prefixes owned by each built-in consumer
    #[serde(default)]
    pub prefixes: PrefixConfig,
    /// Pools applied before the prefix watches start
    #[serde(default)]
    pub pools: StaticPools,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Defaults
    /// 2. Base config file
    /// 3. Explicit config file
    /// 4. Environment variables
    ///
    /// # Arguments
    /// * `path` - Optional path to an explicit configuration file. Falls back to `HOTPOOL_CONFIG`.
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default())?;

        let mut config = Config::builder().add_source(defaults);

        config = config.add_source(File::with_name("config/hotpool").required(false));

        if let Some(path) = path {
            config = config.add_source(File::with_name(path).required(true));
        } else if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("HOTPOOL")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.log.validate()?;
        self.store.validate()?;
        self.watch.validate()?;
        self.pool.validate()?;
        self.prefixes.validate()?;
        self.pools.validate()?;
        Ok(())
    }

    /// Effective log filter; develop environments always log at debug.
    pub fn log_filter(&self) -> String {
        if self.env == RunEnvironment::Develop {
            "debug".to_string()
        } else {
            self.log.level.clone()
        }
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}
