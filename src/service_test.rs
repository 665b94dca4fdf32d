//! Tests for the interactive query service façade.

use crate::config::{InteractiveQueryConfig, StateStoreRetry};
use crate::engine::{Engine, UnavailableReason};
use crate::error::{ConfigError, QueryError};
use crate::host::HostInfo;
use crate::local_engine::LocalEngine;
use crate::partitioning::StringEncoder;
use crate::registry::EngineRegistry;
use crate::service::InteractiveQueryService;
use crate::store::{InMemoryKeyValueStore, InMemoryWindowStore, key_value_store, window_store};
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config(attempts: u32, backoff_ms: u64) -> InteractiveQueryConfig {
    InteractiveQueryConfig::default()
        .with_state_store_retry(StateStoreRetry::new(attempts, Duration::from_millis(backoff_ms)))
}

fn service(registry: &Arc<EngineRegistry>, config: InteractiveQueryConfig) -> InteractiveQueryService {
    InteractiveQueryService::new(registry.clone(), config).unwrap()
}

fn running_engine() -> Arc<LocalEngine> {
    let engine = Arc::new(LocalEngine::new().with_application_server(HostInfo::new("a", 1)));
    engine.start().unwrap();
    engine.finish_rebalance().unwrap();
    engine
}

#[test]
fn test_rejects_zero_attempts() {
    let registry = Arc::new(EngineRegistry::new());
    let err = InteractiveQueryService::new(registry, config(0, 10)).unwrap_err();
    assert_eq!(err, ConfigError::InvalidMaxAttempts(0));
}

#[test]
fn test_exposes_registry_and_policy() {
    let registry = Arc::new(EngineRegistry::new());
    let svc = service(&registry, config(4, 25));
    assert!(Arc::ptr_eq(svc.registry(), &registry));
    assert_eq!(svc.retry_policy().max_attempts(), 4);
    assert_eq!(svc.retry_policy().backoff_period(), Duration::from_millis(25));
}

#[tokio::test]
async fn test_queryable_store_returns_typed_store() {
    let registry = Arc::new(EngineRegistry::new());
    let engine = running_engine();
    let counts = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    counts.put("alice".to_string(), 3);
    engine.add_store(counts.handle("counts"));
    let windows = Arc::new(InMemoryWindowStore::<String, u64>::new());
    windows.put("alice".to_string(), 60_000, 2);
    engine.add_store(windows.handle("per-minute"));
    registry.register(engine.clone());
    let svc = service(&registry, config(1, 0));

    let kv = svc
        .queryable_store("counts", &key_value_store::<String, u64>())
        .await
        .unwrap();
    assert_eq!(kv.get(&"alice".to_string()), Some(3));

    // Writes after lookup are visible through the handle.
    counts.put("bob".to_string(), 1);
    assert_eq!(kv.get(&"bob".to_string()), Some(1));

    let ws = svc
        .queryable_store("per-minute", &window_store::<String, u64>())
        .await
        .unwrap();
    assert_eq!(ws.fetch(&"alice".to_string(), 0, 120_000), vec![(60_000, 2)]);
}

#[tokio::test]
async fn test_no_engines_fails_after_all_attempts() {
    let registry = Arc::new(EngineRegistry::new());
    let svc = service(&registry, config(3, 20));

    let start = Instant::now();
    let err = svc
        .queryable_store("counts", &key_value_store::<String, u64>())
        .await
        .unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(err.is_store_unavailable());
    assert_eq!(err.store_name(), Some("counts"));
    match &err {
        QueryError::StoreUnavailable { attempts, cause, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(cause.reason, UnavailableReason::NoEngines);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(err.source().is_some());
}

#[tokio::test]
async fn test_wrong_kind_is_unavailable() {
    let registry = Arc::new(EngineRegistry::new());
    let engine = running_engine();
    engine.add_store(Arc::new(InMemoryKeyValueStore::<String, u64>::new()).handle("counts"));
    registry.register(engine.clone());
    let svc = service(&registry, config(2, 1));

    let err = svc
        .queryable_store("counts", &window_store::<String, u64>())
        .await
        .unwrap_err();
    match err {
        QueryError::StoreUnavailable { cause, .. } => {
            assert_eq!(cause.engine, Some(engine.id()));
            assert!(matches!(cause.reason, UnavailableReason::WrongStoreType { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_waits_for_rebalance_to_complete() {
    let registry = Arc::new(EngineRegistry::new());
    let engine = Arc::new(LocalEngine::new());
    let counts = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    counts.put("k".to_string(), 5);
    engine.add_store(counts.handle("counts"));
    engine.start().unwrap();
    registry.register(engine.clone());
    let svc = service(&registry, config(40, 10));

    let finisher = {
        let engine = engine.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            engine.finish_rebalance().unwrap();
        })
    };
    let store = svc
        .queryable_store("counts", &key_value_store::<String, u64>())
        .await
        .unwrap();
    assert_eq!(store.get(&"k".to_string()), Some(5));
    finisher.await.unwrap();
}

#[test]
fn test_current_host_info() {
    let registry = Arc::new(EngineRegistry::new());
    assert_eq!(service(&registry, config(1, 0)).current_host_info().unwrap(), None);

    let svc = service(&registry, config(1, 0).with_application_server("node-3:7070"));
    assert_eq!(svc.current_host_info().unwrap(), Some(HostInfo::new("node-3", 7070)));

    let svc = service(&registry, config(1, 0).with_application_server("node-3"));
    let err = svc.current_host_info().unwrap_err();
    assert!(matches!(
        err,
        QueryError::Configuration(ConfigError::MalformedApplicationServer { .. })
    ));
    // A malformed endpoint only affects current_host_info.
    assert!(svc.all_hosts_info("counts").is_empty());
}

#[test]
fn test_routing_needs_application_server() {
    let registry = Arc::new(EngineRegistry::new());
    let engine = running_engine();
    engine.assign("counts", vec![HostInfo::new("a", 1), HostInfo::new("b", 2)]);
    registry.register(engine.clone());

    let unconfigured = service(&registry, config(1, 0));
    assert_eq!(unconfigured.host_info("counts", "alice", &StringEncoder), None);
    assert!(unconfigured.all_hosts_info("counts").is_empty());

    let configured = service(&registry, config(1, 0).with_application_server("a:1"));
    assert_eq!(
        configured.host_info("counts", "alice", &StringEncoder),
        Some(HostInfo::new("b", 2))
    );
    assert_eq!(configured.all_hosts_info("counts").len(), 2);
}

#[test]
fn test_routing_queries() {
    let registry = Arc::new(EngineRegistry::new());
    let svc = service(&registry, config(1, 0).with_application_server("a:1"));
    assert_eq!(svc.host_info("counts", "alice", &StringEncoder), None);
    assert!(svc.all_hosts_info("counts").is_empty());

    let engine = running_engine();
    engine.assign("counts", vec![HostInfo::new("a", 1), HostInfo::new("b", 2)]);
    registry.register(engine.clone());

    // murmur2 % 2: alice -> 1, bob -> 0
    assert_eq!(svc.host_info("counts", "alice", &StringEncoder), Some(HostInfo::new("b", 2)));
    assert_eq!(
        svc.host_info("counts", &"bob".to_string(), &StringEncoder),
        Some(HostInfo::new("a", 1))
    );
    assert_eq!(
        svc.all_hosts_info("counts"),
        vec![HostInfo::new("a", 1), HostInfo::new("b", 2)]
    );
    assert_eq!(svc.host_info("other", "alice", &StringEncoder), None);
}
