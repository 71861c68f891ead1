use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Connector;
use super::RoundRobin;
use super::SelectionStrategy;
use crate::async_task::spawn_task;
use crate::ConfigConsumer;
use crate::PoolConfig;
use crate::PoolError;
use crate::Result;

/// A published pool: the members built from one applied config.
///
/// Never mutated after publication; a config change yields a new entry.
pub struct PoolEntry<C: Connector> {
    name: String,
    members: Vec<Arc<C::Member>>,
    endpoints: Vec<String>,
    config: C::Config,
}

impl<C: Connector> PoolEntry<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Arc<C::Member>] {
        &self.members
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn applied_config(&self) -> &C::Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<C: Connector> std::fmt::Debug for PoolEntry<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PoolEntry")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .field("config", &self.config)
            .finish()
    }
}

type PoolMap<C> = HashMap<String, Arc<PoolEntry<C>>>;

/// All pools of one resource family, keyed by lower-cased logical name.
///
/// Reads go through an [`ArcSwap`] snapshot and never take a lock. Writers
/// publish a whole new map, so a reader sees either the old or the new entry.
pub struct PoolManager<C: Connector> {
    connector: Arc<C>,
    prefix: String,
    config: PoolConfig,
    entries: ArcSwap<PoolMap<C>>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl<C: Connector> std::fmt::Debug for PoolManager<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("family", &self.connector.family())
            .field("prefix", &self.prefix)
            .field("names", &self.names())
            .finish()
    }
}

impl<C: Connector> PoolManager<C> {
    pub fn new(
        connector: C,
        prefix: impl Into<String>,
        config: PoolConfig,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            prefix: prefix.into(),
            config,
            entries: ArcSwap::from_pointee(HashMap::new()),
            strategy: Arc::new(RoundRobin::new()),
        }
    }

    /// Replaces the default round-robin member selection.
    pub fn with_strategy(
        mut self,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn family(&self) -> &'static str {
        self.connector.family()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// `watch.redis.CacheA` -> `cachea` for a manager owning `watch.redis`.
    /// Names outside the prefix are only lower-cased.
    pub fn normalize(
        &self,
        key: &str,
    ) -> String {
        let prefix = self.prefix.trim_end_matches('.');
        let stripped = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !prefix.is_empty() && !rest.is_empty())
            .unwrap_or(key);
        stripped.to_lowercase()
    }

    /// Decodes a raw payload and applies it under `key`.
    pub async fn put_raw(
        &self,
        key: &str,
        payload: &[u8],
    ) -> Result<()> {
        let name = self.normalize(key);
        let config: C::Config = serde_json::from_slice(payload).map_err(|source| PoolError::Decode {
            family: self.family(),
            name: name.clone(),
            source,
        })?;
        self.apply(&name, config).await
    }

    /// Validates, builds and probes a new pool, then publishes it.
    ///
    /// Any failure leaves the current pool for `key` untouched.
    pub async fn apply(
        &self,
        key: &str,
        config: C::Config,
    ) -> Result<()> {
        let name = self.normalize(key);
        self.connector.validate(&name, &config)?;

        let endpoints = self.connector.endpoints(&config);
        if endpoints.is_empty() {
            return Err(PoolError::NoMembers {
                family: self.family(),
                name,
            }
            .into());
        }

        let members = self.build(&name, &endpoints, &config).await?;
        if let Err(e) = self.probe_all(&name, &endpoints, &members).await {
            let discarded = members;
            let connector = self.connector.clone();
            let family = self.family();
            tokio::spawn(async move {
                if let Err(e) = close_members(&*connector, &discarded).await {
                    warn!(family, "closing rejected members failed: {}", e);
                }
            });
            return Err(e);
        }

        let entry = Arc::new(PoolEntry {
            name: name.clone(),
            members: members.into_iter().map(Arc::new).collect(),
            endpoints,
            config,
        });

        let previous = self.entries.rcu(|current| {
            let mut next = PoolMap::<C>::clone(current);
            next.insert(name.clone(), entry.clone());
            next
        });
        info!(family = self.family(), name, members = entry.len(), "rebuild pool done");

        if let Some(old) = previous.get(&name) {
            self.retire(old.clone());
        }
        Ok(())
    }

    /// Unpublishes `key`; absence is not an error.
    pub async fn remove(
        &self,
        key: &str,
    ) -> Result<()> {
        let name = self.normalize(key);
        let previous = self.entries.rcu(|current| {
            let mut next = PoolMap::<C>::clone(current);
            next.remove(&name);
            next
        });

        match previous.get(&name) {
            Some(old) => {
                info!(family = self.family(), name, "delete pool done");
                self.strategy.forget(&name);
                self.retire(old.clone());
            }
            None => debug!(family = self.family(), name, "delete of unknown pool ignored"),
        }
        Ok(())
    }

    /// Case-insensitive lookup. A miss lists every registered name.
    pub fn lookup(
        &self,
        key: &str,
    ) -> Result<Arc<PoolEntry<C>>> {
        let name = self.normalize(key);
        let entries = self.entries.load();
        match entries.get(&name) {
            Some(entry) => Ok(entry.clone()),
            None => {
                let mut registered: Vec<String> = entries.keys().cloned().collect();
                registered.sort();
                Err(PoolError::NotFound {
                    family: self.family(),
                    name,
                    registered,
                }
                .into())
            }
        }
    }

    /// One member of `key`, chosen by the manager's strategy.
    pub fn select(
        &self,
        key: &str,
    ) -> Result<Arc<C::Member>> {
        self.select_with(key, self.strategy.as_ref())
    }

    pub fn select_with(
        &self,
        key: &str,
        strategy: &dyn SelectionStrategy,
    ) -> Result<Arc<C::Member>> {
        let entry = self.lookup(key)?;
        let idx = match entry.members.len() {
            0 => {
                return Err(PoolError::NoMembers {
                    family: self.family(),
                    name: entry.name.clone(),
                }
                .into())
            }
            1 => 0,
            n => strategy.pick(&entry.name, n).min(n - 1),
        };
        Ok(entry.members[idx].clone())
    }

    /// Applies statically configured pools. Every entry is attempted; the
    /// failures are returned together.
    pub async fn bootstrap<I>(
        &self,
        configs: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (String, C::Config)>,
    {
        let mut failures = Vec::new();
        for (name, config) in configs {
            if let Err(e) = self.apply(&name, config).await {
                error!(family = self.family(), name, "bootstrap pool failed: {}", e);
                failures.push(format!("{name}: {e}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Aggregate(failures).into())
        }
    }

    /// Unpublishes every pool and closes all members now.
    pub async fn shutdown(&self) -> Result<()> {
        let previous = self.entries.swap(Arc::new(HashMap::new()));
        let mut failures = Vec::new();
        for (name, entry) in previous.iter() {
            self.strategy.forget(name);
            if let Err(e) = close_members(&*self.connector, &entry.members).await {
                failures.push(format!("{name}: {e}"));
            }
        }
        info!(family = self.family(), pools = previous.len(), "pool manager shut down");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Aggregate(failures).into())
        }
    }

    /// Sorted names of every published pool
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    async fn build(
        &self,
        name: &str,
        endpoints: &[String],
        config: &C::Config,
    ) -> Result<Vec<C::Member>> {
        let mut members = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            match self.connector.connect(endpoint, config).await {
                Ok(member) => members.push(member),
                Err(e) => {
                    error!(family = self.family(), name, endpoint, "build member failed: {}", e);
                    if let Err(close_err) = close_members(&*self.connector, &members).await {
                        warn!(family = self.family(), name, "closing partial members failed: {}", close_err);
                    }
                    return Err(e);
                }
            }
        }
        Ok(members)
    }

    async fn probe_all(
        &self,
        name: &str,
        endpoints: &[String],
        members: &[C::Member],
    ) -> Result<()> {
        let limit = self.config.probe_timeout();
        for (member, endpoint) in members.iter().zip(endpoints) {
            let reason = match timeout(limit, self.connector.probe(member)).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("no answer within {limit:?}"),
            };
            error!(family = self.family(), name, endpoint, "pool member failed probe: {}", reason);
            return Err(PoolError::Probe {
                family: self.family(),
                name: name.to_string(),
                endpoint: endpoint.clone(),
                reason,
            }
            .into());
        }
        Ok(())
    }

    /// Closes `entry` after the grace period without blocking the caller.
    fn retire(
        &self,
        entry: Arc<PoolEntry<C>>,
    ) {
        let connector = self.connector.clone();
        let grace: Duration = self.config.close_grace();
        let family = self.family();
        debug!(family, name = entry.name, ?grace, "pool retired");

        let task_name = format!("close retired {family} pool {}", entry.name);
        spawn_task(&task_name, move || async move {
            tokio::time::sleep(grace).await;
            close_members(&*connector, &entry.members).await?;
            debug!(family, name = entry.name, "retired pool closed");
            Ok(())
        });
    }
}

/// Closes each member, collecting every failure.
async fn close_members<C, M>(
    connector: &C,
    members: &[M],
) -> Result<()>
where
    C: Connector + ?Sized,
    M: std::borrow::Borrow<C::Member>,
{
    let mut failures = Vec::new();
    for member in members {
        if let Err(e) = connector.close(member.borrow()).await {
            failures.push(e.to_string());
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(PoolError::Aggregate(failures).into())
    }
}

#[async_trait]
impl<C: Connector> ConfigConsumer for PoolManager<C> {
    async fn on_put(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let key = String::from_utf8_lossy(key);
        debug!(family = self.family(), key = %key, "pool config put");
        self.put_raw(&key, value).await
    }

    async fn on_delete(
        &self,
        key: &[u8],
    ) -> Result<()> {
        let key = String::from_utf8_lossy(key);
        debug!(family = self.family(), key = %key, "pool config delete");
        self.remove(&key).await
    }

    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}
