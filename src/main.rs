use std::sync::Arc;
use std::time::Duration;

use hotpool::logging::init_logging;
use hotpool::CacheConnector;
use hotpool::ConfigStore;
use hotpool::DatabaseConnector;
use hotpool::Engine;
use hotpool::MemStore;
use hotpool::MessagingConnector;
use hotpool::PoolManager;
use hotpool::PrefixRegistry;
use hotpool::Result;
use hotpool::Settings;
use tracing::info;
use tracing::warn;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    let store: Arc<dyn ConfigStore> = Arc::new(MemStore::with_seed(
        &settings.store.project_name,
        &settings.store.seed,
    ));
    let registry = Arc::new(PrefixRegistry::new(
        store.clone(),
        settings.store.project_name.clone(),
        settings.watch.clone(),
    ));

    let cache = Arc::new(PoolManager::new(
        CacheConnector,
        settings.prefixes.cache.clone(),
        settings.pool.clone(),
    ));
    let database = Arc::new(PoolManager::new(
        DatabaseConnector::new(settings.pool.probe_timeout()),
        settings.prefixes.database.clone(),
        settings.pool.clone(),
    ));
    let messaging = Arc::new(PoolManager::new(
        MessagingConnector,
        settings.prefixes.messaging.clone(),
        settings.pool.clone(),
    ));

    let mut engine = Engine::new();

    let log_filter = settings.log_filter();
    engine.reg_core_pre_run("logging", 0, move || async move { init_logging(&log_filter) })?;

    let connect_retry = settings.store.connect_retry;
    engine.reg_core_pre_run("config source", 1, move || async move {
        hotpool::connect_with_retry(store, connect_retry).await.map(|_| ())
    })?;

    {
        let (cache, database, messaging) = (cache.clone(), database.clone(), messaging.clone());
        let pools = settings.pools.clone();
        engine.reg_core_pre_run("static pools", 2, move || async move {
            cache.bootstrap(pools.cache).await?;
            database.bootstrap(pools.database).await?;
            messaging.bootstrap(pools.messaging).await
        })?;
    }

    {
        let (registry, cache, database, messaging) =
            (registry.clone(), cache.clone(), database.clone(), messaging.clone());
        let config_prefix = settings.prefixes.config.clone();
        engine.reg_core_pre_run("prefix watches", 3, move || async move {
            registry.register(cache).await?;
            registry.register(database).await?;
            registry.register(messaging).await?;
            registry.start_watch_config(config_prefix).await
        })?;
    }

    let watch_registry = registry.clone();
    engine.reg_core_post_run("prefix watches", 1, move || async move {
        watch_registry.shutdown();
        Ok(())
    })?;

    {
        let (cache, database, messaging) = (cache.clone(), database.clone(), messaging.clone());
        engine.reg_core_post_run("resource pools", 2, move || async move {
            for result in [cache.shutdown().await, database.shutdown().await, messaging.shutdown().await] {
                if let Err(e) = result {
                    warn!("close pools: {}", e);
                }
            }
            Ok(())
        })?;
    }

    engine
        .run(report_pools(registry, cache, database, messaging))
        .await?;

    println!("Exiting program.");
    Ok(())
}

/// Keeps the process alive, periodically logging what is published.
async fn report_pools(
    registry: Arc<PrefixRegistry>,
    cache: Arc<PoolManager<CacheConnector>>,
    database: Arc<PoolManager<DatabaseConnector>>,
    messaging: Arc<PoolManager<MessagingConnector>>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        info!(
            bindings = ?registry.bindings(),
            cache = ?cache.names(),
            database = ?database.names(),
            messaging = ?messaging.names(),
            "published pools"
        );
    }
}
