//! Hot-reloadable resource pools.
//!
//! A [`PoolManager`] owns every pool of one resource family (cache, database,
//! messaging). It consumes configuration changes from the registry, builds and
//! probes fresh members, publishes them atomically and retires the previous
//! pool after a grace period. The family specific parts live behind
//! [`Connector`].

mod cache;
mod database;
mod manager;
mod messaging;
mod resp;
mod strategy;

pub use cache::*;
pub use database::*;
pub use manager::*;
pub use messaging::*;
pub use resp::RespValue;
pub use strategy::*;

#[cfg(test)]
mod strategy_test;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::Result;

/// Family specific half of a pool manager: how to read a config payload and
/// how to open, check and close one member.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Config: DeserializeOwned + Debug + Clone + Send + Sync + 'static;
    type Member: Send + Sync + 'static;

    /// Short family label used in errors and logs, e.g. `redis`
    fn family(&self) -> &'static str;

    /// Rejects configs with missing or non-positive required fields.
    fn validate(
        &self,
        name: &str,
        config: &Self::Config,
    ) -> Result<()>;

    /// One member is built per returned endpoint.
    fn endpoints(
        &self,
        config: &Self::Config,
    ) -> Vec<String>;

    async fn connect(
        &self,
        endpoint: &str,
        config: &Self::Config,
    ) -> Result<Self::Member>;

    /// Liveness round trip. Bounded by the manager's probe timeout.
    async fn probe(
        &self,
        member: &Self::Member,
    ) -> Result<()>;

    async fn close(
        &self,
        member: &Self::Member,
    ) -> Result<()>;
}
