use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::BackoffPolicy;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Namespace every key lives under: `/<project_name>/...`
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Store endpoints, informational for the in-memory adaptor
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Reachability check policy applied when the store is first opened
    #[serde(default)]
    pub connect_retry: BackoffPolicy,

    /// Initial entries (internal dotted key -> raw value) for the in-memory adaptor
    #[serde(default)]
    pub seed: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            endpoints: Vec::new(),
            connect_retry: BackoffPolicy::default(),
            seed: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project_name.is_empty() {
            return Err(invalid("store.project_name should not be empty"));
        }
        if self.project_name.contains('/') {
            return Err(invalid(format!(
                "store.project_name must not contain '/': {}",
                self.project_name
            )));
        }
        if self.connect_retry.max_retries == 0 {
            return Err(invalid("store.connect_retry.max_retries must be > 0"));
        }
        Ok(())
    }
}

/// Prefix each built-in consumer registers under.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PrefixConfig {
    #[serde(default = "default_cache_prefix")]
    pub cache: String,
    #[serde(default = "default_database_prefix")]
    pub database: String,
    #[serde(default = "default_messaging_prefix")]
    pub messaging: String,
    #[serde(default = "default_config_prefix")]
    pub config: String,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            cache: default_cache_prefix(),
            database: default_database_prefix(),
            messaging: default_messaging_prefix(),
            config: default_config_prefix(),
        }
    }
}

impl PrefixConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, prefix) in [
            ("cache", &self.cache),
            ("database", &self.database),
            ("messaging", &self.messaging),
            ("config", &self.config),
        ] {
            if prefix.trim_matches('.').is_empty() {
                return Err(invalid(format!("prefixes.{field} should not be empty")));
            }
        }
        Ok(())
    }
}

fn default_project_name() -> String {
    "hotpool".to_string()
}
fn default_cache_prefix() -> String {
    "watch.redis".to_string()
}
fn default_database_prefix() -> String {
    "watch.mysql".to_string()
}
fn default_messaging_prefix() -> String {
    "watch.rabbitmq".to_string()
}
fn default_config_prefix() -> String {
    "business".to_string()
}
