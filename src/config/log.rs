use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Where the process runs; `develop` turns on verbose logging.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    #[default]
    Product,
    Gray,
    Test,
    Develop,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(invalid(format!(
                "log.level must be one of {:?}, got {}",
                LEVELS, self.level
            )));
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}
