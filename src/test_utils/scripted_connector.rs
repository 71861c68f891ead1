use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::Connector;
use crate::Error;
use crate::PoolError;
use crate::Result;

/// Payload understood by [`ScriptedConnector`]: `{"addr": "up:1,up:2", "weight": 1}`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScriptedConfig {
    #[serde(default)]
    pub addr: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    1
}

#[derive(Debug)]
pub struct ScriptedMember {
    pub endpoint: String,
    pub id: u64,
    closed: AtomicBool,
}

impl ScriptedMember {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector whose behaviour is driven by the endpoint name:
/// `unreachable*` fails to connect, `down*` fails the probe, `slow*` never
/// answers the probe and `stuck*` fails to close.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    next_id: Arc<AtomicU64>,
    closed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints closed so far, in close order
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }

    pub fn connects(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Config = ScriptedConfig;
    type Member = ScriptedMember;

    fn family(&self) -> &'static str {
        "scripted"
    }

    fn validate(
        &self,
        name: &str,
        config: &ScriptedConfig,
    ) -> Result<()> {
        if config.addr.is_empty() || config.weight <= 0 {
            return Err(PoolError::Validation {
                family: self.family(),
                name: name.to_string(),
                reason: format!("bad scripted config {config:?}"),
            }
            .into());
        }
        Ok(())
    }

    fn endpoints(
        &self,
        config: &ScriptedConfig,
    ) -> Vec<String> {
        config
            .addr
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    async fn connect(
        &self,
        endpoint: &str,
        _config: &ScriptedConfig,
    ) -> Result<ScriptedMember> {
        if endpoint.starts_with("unreachable") {
            return Err(PoolError::Connect {
                family: self.family(),
                endpoint: endpoint.to_string(),
                reason: "refused".to_string(),
            }
            .into());
        }
        Ok(ScriptedMember {
            endpoint: endpoint.to_string(),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            closed: AtomicBool::new(false),
        })
    }

    async fn probe(
        &self,
        member: &ScriptedMember,
    ) -> Result<()> {
        if member.endpoint.starts_with("down") {
            return Err(Error::Fatal(format!("{} did not answer ping", member.endpoint)));
        }
        if member.endpoint.starts_with("slow") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn close(
        &self,
        member: &ScriptedMember,
    ) -> Result<()> {
        member.closed.store(true, Ordering::SeqCst);
        self.closed.lock().push(member.endpoint.clone());
        if member.endpoint.starts_with("stuck") {
            return Err(Error::Fatal(format!("{} refused to close", member.endpoint)));
        }
        Ok(())
    }
}
