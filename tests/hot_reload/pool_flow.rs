use std::collections::BTreeMap;
use std::sync::Arc;

use hotpool::ConfigStore;
use hotpool::Error;
use hotpool::KeyNotation;
use hotpool::MemStore;
use hotpool::MessagingConnector;
use hotpool::PoolError;
use hotpool::PoolManager;
use hotpool::PrefixRegistry;
use hotpool::RegistryError;

use crate::common::closed_port;
use crate::common::enable_logger;
use crate::common::eventually;
use crate::common::pool_config;
use crate::common::spawn_broker;
use crate::common::watch_config;

const PROJECT: &str = "gapi";

fn payload(addr: &str) -> String {
    format!(r#"{{"url":"amqp://guest:guest@{addr}/"}}"#)
}

fn setup(store: &MemStore) -> (Arc<PrefixRegistry>, Arc<PoolManager<MessagingConnector>>) {
    let shared: Arc<dyn ConfigStore> = Arc::new(store.clone());
    let registry = Arc::new(PrefixRegistry::new(shared, PROJECT, watch_config()));
    let manager = Arc::new(PoolManager::new(MessagingConnector, "watch.rabbitmq", pool_config()));
    (registry, manager)
}

#[tokio::test]
async fn test_catch_up_then_live_reload_and_delete() {
    enable_logger();
    let broker = spawn_broker().await;
    let notation = KeyNotation::new(PROJECT);
    let mut seed = BTreeMap::new();
    seed.insert("watch.rabbitmq.Orders".to_string(), payload(&broker));
    let store = MemStore::with_seed(PROJECT, &seed);
    let (registry, manager) = setup(&store);

    registry.register(manager.clone()).await.unwrap();
    let first = manager.lookup("orders").unwrap();
    assert_eq!(first.members()[0].addr(), broker);

    let second_broker = spawn_broker().await;
    store.put(
        notation.to_external_key("watch.rabbitmq.orders"),
        payload(&second_broker),
    );
    assert!(
        eventually(|| {
            let manager = manager.clone();
            let expected = second_broker.clone();
            async move {
                manager
                    .lookup("orders")
                    .map(|e| e.members()[0].addr() == expected)
                    .unwrap_or(false)
            }
        })
        .await
    );
    assert!(
        eventually(|| {
            let first = first.clone();
            async move { first.members()[0].is_closed() }
        })
        .await
    );

    store.delete(notation.to_external_key("watch.rabbitmq.orders"));
    assert!(
        eventually(|| {
            let manager = manager.clone();
            async move { manager.is_empty() }
        })
        .await
    );
    registry.shutdown();
}

#[tokio::test]
async fn test_unreachable_update_keeps_previous_pool() {
    let broker = spawn_broker().await;
    let down = closed_port().await;
    let notation = KeyNotation::new(PROJECT);
    let store = MemStore::new();
    let (registry, manager) = setup(&store);
    registry.register(manager.clone()).await.unwrap();

    let key = notation.to_external_key("watch.rabbitmq.billing");
    store.put(&key, payload(&broker));
    assert!(
        eventually(|| {
            let manager = manager.clone();
            async move { manager.lookup("billing").is_ok() }
        })
        .await
    );

    store.put(&key, payload(&down));
    store.put(notation.to_external_key("watch.rabbitmq.audit"), payload(&broker));
    assert!(
        eventually(|| {
            let manager = manager.clone();
            async move { manager.lookup("audit").is_ok() }
        })
        .await
    );
    assert_eq!(manager.lookup("billing").unwrap().members()[0].addr(), broker);

    match manager.lookup("missing") {
        Err(Error::Pool(PoolError::NotFound { registered, .. })) => {
            assert_eq!(registered, vec!["audit".to_string(), "billing".to_string()]);
        }
        other => panic!("unexpected lookup result: {other:?}"),
    }
    registry.shutdown();
}

#[tokio::test]
async fn test_failed_catch_up_fails_registration_closed() {
    let down = closed_port().await;
    let mut seed = BTreeMap::new();
    seed.insert("watch.rabbitmq.orders".to_string(), payload(&down));
    let store = MemStore::with_seed(PROJECT, &seed);
    let (registry, manager) = setup(&store);

    let err = registry.register(manager.clone()).await.unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::CatchUp { .. })));
    assert!(manager.is_empty());

    let again = registry.register(manager.clone()).await.unwrap_err();
    assert!(matches!(again, Error::Registry(RegistryError::DuplicateBinding { .. })));
}

#[tokio::test]
async fn test_config_prefix_mirrors_into_cache() {
    let notation = KeyNotation::new(PROJECT);
    let mut seed = BTreeMap::new();
    seed.insert("business.timeout".to_string(), "30".to_string());
    let store = MemStore::with_seed(PROJECT, &seed);
    let (registry, _) = setup(&store);

    registry.start_watch_config("business").await.unwrap();
    let cache = registry.config_cache();
    assert_eq!(
        cache.load_string("business.timeout").unwrap().as_deref(),
        Some("30")
    );

    store.put(notation.to_external_key("business.retries"), "5");
    assert!(
        eventually(|| {
            let cache = cache.clone();
            async move { cache.load("business.retries").is_some() }
        })
        .await
    );
    registry.shutdown();
}
