use std::collections::BTreeMap;
use std::sync::Arc;

use hotpool::connect_with_retry;
use hotpool::BackoffPolicy;
use hotpool::BindingState;
use hotpool::ConfigStore;
use hotpool::Engine;
use hotpool::Error;
use hotpool::KeyNotation;
use hotpool::MemStore;
use hotpool::MessagingConfig;
use hotpool::MessagingConnector;
use hotpool::PoolManager;
use hotpool::PrefixRegistry;
use hotpool::StaticPools;
use hotpool::Tier;
use parking_lot::Mutex;

use crate::common::enable_logger;
use crate::common::eventually;
use crate::common::pool_config;
use crate::common::spawn_broker;
use crate::common::watch_config;

fn fast_retry() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 2,
        timeout_ms: 100,
        base_delay_ms: 5,
        max_delay_ms: 10,
    }
}

#[tokio::test]
async fn test_engine_brings_up_watches_and_tears_down_pools() {
    enable_logger();
    let broker = spawn_broker().await;
    let mut seed = BTreeMap::new();
    seed.insert(
        "watch.rabbitmq.orders".to_string(),
        format!(r#"{{"url":"amqp://{broker}"}}"#),
    );
    let store: Arc<dyn ConfigStore> = Arc::new(MemStore::with_seed("hotpool", &seed));
    let registry = Arc::new(PrefixRegistry::new(store.clone(), "hotpool", watch_config()));
    let manager = Arc::new(PoolManager::new(MessagingConnector, "watch.rabbitmq", pool_config()));

    let mut engine = Engine::new();
    engine
        .reg_core_pre_run("config source", 1, move || async move {
            connect_with_retry(store, fast_retry()).await.map(|_| ())
        })
        .unwrap();
    {
        let (registry, manager) = (registry.clone(), manager.clone());
        engine
            .reg_core_pre_run("prefix watches", 2, move || async move { registry.register(manager).await })
            .unwrap();
    }
    {
        let registry = registry.clone();
        engine
            .reg_post_run("stop watches", Tier::HIGH, move || async move {
                registry.shutdown();
                Ok(())
            })
            .unwrap();
    }
    {
        let manager = manager.clone();
        engine
            .reg_post_run("close pools", Tier::MID, move || async move { manager.shutdown().await })
            .unwrap();
    }

    let served = Arc::new(Mutex::new(None));
    let (serving, slot) = (manager.clone(), served.clone());
    engine
        .run_until(
            async move {
                let entry = serving.lookup("orders")?;
                *slot.lock() = Some(entry.members()[0].clone());
                Ok(())
            },
            std::future::pending(),
        )
        .await
        .unwrap();

    let member = served.lock().take().unwrap();
    assert!(member.is_closed());
    assert!(manager.is_empty());
    assert_eq!(
        registry.binding_state("watch.rabbitmq"),
        Some(BindingState::Active)
    );
}

#[tokio::test]
async fn test_static_pools_come_up_before_prefix_watches() {
    enable_logger();
    let broker = spawn_broker().await;
    let mut seed = BTreeMap::new();
    seed.insert(
        "watch.rabbitmq.billing".to_string(),
        format!(r#"{{"url":"amqp://{broker}"}}"#),
    );
    let store = MemStore::with_seed("hotpool", &seed);
    let shared: Arc<dyn ConfigStore> = Arc::new(store.clone());
    let registry = Arc::new(PrefixRegistry::new(shared, "hotpool", watch_config()));
    let manager = Arc::new(PoolManager::new(MessagingConnector, "watch.rabbitmq", pool_config()));

    let mut pools = StaticPools::default();
    pools.messaging.insert(
        "Events".to_string(),
        MessagingConfig {
            url: format!("amqp://guest:guest@{broker}/"),
        },
    );

    let mut engine = Engine::new();
    {
        let manager = manager.clone();
        engine
            .reg_core_pre_run("static pools", 1, move || async move {
                manager.bootstrap(pools.messaging).await
            })
            .unwrap();
    }
    {
        let (registry, manager) = (registry.clone(), manager.clone());
        engine
            .reg_core_pre_run("prefix watches", 2, move || async move {
                if manager.names() != vec!["events".to_string()] {
                    return Err(Error::Fatal(format!("watches started first: {:?}", manager.names())));
                }
                registry.register(manager).await
            })
            .unwrap();
    }
    {
        let manager = manager.clone();
        engine
            .reg_core_post_run("resource pools", 1, move || async move { manager.shutdown().await })
            .unwrap();
    }

    let (serving, live) = (manager.clone(), store.clone());
    engine
        .run_until(
            async move {
                assert_eq!(serving.names(), vec!["billing".to_string(), "events".to_string()]);
                live.put(
                    KeyNotation::new("hotpool").to_external_key("watch.rabbitmq.audit"),
                    format!(r#"{{"url":"amqp://{broker}"}}"#),
                );
                let watched = eventually(|| {
                    let serving = serving.clone();
                    async move { serving.lookup("audit").is_ok() }
                })
                .await;
                assert!(watched);
                Ok(())
            },
            std::future::pending(),
        )
        .await
        .unwrap();

    assert!(manager.is_empty());
    registry.shutdown();
}

#[tokio::test]
async fn test_unreachable_store_aborts_bring_up() {
    let store = MemStore::new();
    store.set_available(false);
    let store: Arc<dyn ConfigStore> = Arc::new(store);

    let mut engine = Engine::new();
    engine
        .reg_core_pre_run("config source", 1, move || async move {
            connect_with_retry(store, fast_retry()).await.map(|_| ())
        })
        .unwrap();

    let err = engine
        .run_until(async { Ok(()) }, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Step(_)));
    assert!(err.to_string().contains("config source"));
}
