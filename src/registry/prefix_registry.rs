use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ConfigCache;
use super::ConfigConsumer;
use super::KeyNotation;
use crate::connect_with_retry;
use crate::ConfigStore;
use crate::EventKind;
use crate::RegistryError;
use crate::Result;
use crate::StoreConfig;
use crate::WatchConfig;
use crate::Watcher;

/// Progress of a prefix binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    CatchingUp,
    Active,
    /// Catch-up failed; the prefix stays reserved and no watch runs
    Failed,
}

struct Binding {
    state: BindingState,
    watcher: Watcher,
    subscription: Option<JoinHandle<()>>,
}

/// Owns one [`Watcher`] per registered prefix.
///
/// Bindings are write-once: a normalized prefix can be claimed a single time
/// for the lifetime of the registry, even if its catch-up later fails.
pub struct PrefixRegistry {
    store: Arc<dyn ConfigStore>,
    notation: KeyNotation,
    watch_config: WatchConfig,
    bindings: DashMap<String, Mutex<Binding>>,
    config_cache: Arc<ConfigCache>,
}

impl std::fmt::Debug for PrefixRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PrefixRegistry")
            .field("project", &self.notation.project())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl PrefixRegistry {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        project: impl Into<String>,
        watch_config: WatchConfig,
    ) -> Self {
        Self {
            store,
            notation: KeyNotation::new(project),
            watch_config,
            bindings: DashMap::new(),
            config_cache: Arc::new(ConfigCache::new()),
        }
    }

    /// Checks store reachability with the configured retry policy before
    /// building the registry.
    pub async fn connect(
        store: Arc<dyn ConfigStore>,
        store_config: &StoreConfig,
        watch_config: WatchConfig,
    ) -> Result<Self> {
        connect_with_retry(store.clone(), store_config.connect_retry).await?;
        info!(
            project = store_config.project_name,
            endpoints = ?store_config.endpoints,
            "config store client ready for watch"
        );
        Ok(Self::new(store, store_config.project_name.clone(), watch_config))
    }

    pub fn notation(&self) -> &KeyNotation {
        &self.notation
    }

    /// Shared cache filled by [`PrefixRegistry::start_watch_config`]
    pub fn config_cache(&self) -> Arc<ConfigCache> {
        self.config_cache.clone()
    }

    /// Binds `consumer` to its prefix, replays the current snapshot into it
    /// and starts the live subscription.
    ///
    /// Fails when the prefix is already bound, or when any `on_put` of the
    /// catch-up fails; in the latter case no live watch is started.
    pub async fn register(
        &self,
        consumer: Arc<dyn ConfigConsumer>,
    ) -> Result<()> {
        let prefix = consumer.prefix();
        let path = self.notation.to_external_prefix(&prefix);

        let watcher = match self.bindings.entry(path.clone()) {
            Entry::Occupied(_) => {
                warn!(prefix, path, "prefix already bound");
                return Err(RegistryError::DuplicateBinding { prefix: path }.into());
            }
            Entry::Vacant(slot) => {
                let watcher = Watcher::new(path.clone(), true, self.store.clone(), self.watch_config.clone());
                slot.insert(Mutex::new(Binding {
                    state: BindingState::CatchingUp,
                    watcher: watcher.clone(),
                    subscription: None,
                }));
                watcher
            }
        };

        if let Err(e) = self.catch_up(&watcher, consumer.clone()).await {
            error!(prefix, path, "catch-up failed: {}", e);
            watcher.close();
            self.set_state(&path, BindingState::Failed, None);
            return Err(RegistryError::CatchUp {
                prefix,
                source: Box::new(e),
            }
            .into());
        }

        let subscription = self.subscribe(&watcher, consumer);
        match subscription {
            Ok(handle) => {
                self.set_state(&path, BindingState::Active, Some(handle));
                info!(prefix, path, revision = watcher.revision(), "start watch success");
                Ok(())
            }
            Err(e) => {
                watcher.close();
                self.set_state(&path, BindingState::Failed, None);
                Err(e)
            }
        }
    }

    /// Mirrors every key under `prefix` into the shared [`ConfigCache`].
    pub async fn start_watch_config(
        &self,
        prefix: impl Into<String>,
    ) -> Result<()> {
        let consumer = CacheFeed {
            prefix: prefix.into(),
            cache: self.config_cache.clone(),
        };
        self.register(Arc::new(consumer)).await
    }

    pub fn is_bound(
        &self,
        prefix: &str,
    ) -> bool {
        self.bindings.contains_key(&self.notation.to_external_prefix(prefix))
    }

    pub fn binding_state(
        &self,
        prefix: &str,
    ) -> Option<BindingState> {
        self.bindings
            .get(&self.notation.to_external_prefix(prefix))
            .map(|b| b.lock().state)
    }

    /// External paths of every binding with its state, sorted by path
    pub fn bindings(&self) -> Vec<(String, BindingState)> {
        let mut all: Vec<_> = self
            .bindings
            .iter()
            .map(|b| (b.key().clone(), b.value().lock().state))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Closes every watcher. Bindings stay reserved.
    pub fn shutdown(&self) {
        for binding in self.bindings.iter() {
            let binding = binding.value().lock();
            binding.watcher.close();
        }
        info!(bindings = self.bindings.len(), "prefix registry shut down");
    }

    async fn catch_up(
        &self,
        watcher: &Watcher,
        consumer: Arc<dyn ConfigConsumer>,
    ) -> Result<()> {
        let notation = self.notation.clone();
        watcher
            .get_with_callback(move |event| {
                let consumer = consumer.clone();
                let key = notation.to_internal(&event.key_str());
                async move {
                    debug!(key, revision = event.revision, "catch-up put");
                    consumer.on_put(key.as_bytes(), &event.value).await
                }
            })
            .await
    }

    fn subscribe(
        &self,
        watcher: &Watcher,
        consumer: Arc<dyn ConfigConsumer>,
    ) -> Result<JoinHandle<()>> {
        let notation = self.notation.clone();
        watcher.watch_with_callback(move |event| {
            let consumer = consumer.clone();
            let key = notation.to_internal(&event.key_str());
            async move {
                match event.kind {
                    EventKind::Put => consumer.on_put(key.as_bytes(), &event.value).await,
                    EventKind::Delete => consumer.on_delete(key.as_bytes()).await,
                }
            }
        })
    }

    fn set_state(
        &self,
        path: &str,
        state: BindingState,
        subscription: Option<JoinHandle<()>>,
    ) {
        if let Some(binding) = self.bindings.get(path) {
            let mut binding = binding.lock();
            binding.state = state;
            if subscription.is_some() {
                binding.subscription = subscription;
            }
        }
    }
}

impl Drop for PrefixRegistry {
    fn drop(&mut self) {
        for binding in self.bindings.iter() {
            let binding = binding.value().lock();
            binding.watcher.close();
            if let Some(handle) = &binding.subscription {
                handle.abort();
            }
        }
    }
}

/// Consumer that mirrors a prefix into the registry's [`ConfigCache`]
struct CacheFeed {
    prefix: String,
    cache: Arc<ConfigCache>,
}

#[async_trait::async_trait]
impl ConfigConsumer for CacheFeed {
    async fn on_put(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        self.cache.store(String::from_utf8_lossy(key), value.to_vec());
        Ok(())
    }

    async fn on_delete(
        &self,
        key: &[u8],
    ) -> Result<()> {
        self.cache.delete(&String::from_utf8_lossy(key));
        Ok(())
    }

    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}
