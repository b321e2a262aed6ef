//! Integration tests wiring a pool to a shutdown coordinator from configuration

use prometheus_lifecycle::builders::{build_coordinator, build_pool, build_pool_for_shutdown};
use prometheus_lifecycle::config::{LifecycleConfig, PoolConfig, ShutdownConfig};
use prometheus_lifecycle::core::{AlwaysHealthy, PoolError, ShutdownError, ShutdownState};
use prometheus_lifecycle::runtime::TokioSpawner;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_factory() -> (Arc<AtomicUsize>, impl Fn() -> anyhow::Result<usize> + Send + Sync + 'static) {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    (created, move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
}

#[tokio::test]
async fn test_build_pool_from_config() {
    let (created, factory) = counting_factory();
    let spawner = TokioSpawner::current().unwrap();
    let cfg = PoolConfig::new().with_capacity(2);

    let pool = build_pool(&cfg, factory, AlwaysHealthy, &spawner).unwrap();

    assert_eq!(pool.capacity(), 2);
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().idle, 2);
}

#[tokio::test]
async fn test_build_pool_rejects_invalid_config() {
    let (created, factory) = counting_factory();
    let spawner = TokioSpawner::current().unwrap();
    let cfg = PoolConfig::new().with_capacity(0);

    let err = build_pool(&cfg, factory, AlwaysHealthy, &spawner).unwrap_err();

    assert!(matches!(err, PoolError::InvalidConfig(_)));
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_build_coordinator_validates_deadline() {
    let coordinator = build_coordinator(&ShutdownConfig::with_deadline(Duration::from_secs(3))).unwrap();
    assert_eq!(coordinator.deadline(), Duration::from_secs(3));
    assert_eq!(coordinator.state(), ShutdownState::Idle);

    let err = build_coordinator(&ShutdownConfig::with_deadline(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, ShutdownError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_shutdown_closes_wired_pool() {
    let cfg = LifecycleConfig::from_json_str(
        r#"{
            "pool": { "capacity": 2, "monitor_interval_ms": 50 },
            "shutdown": { "deadline_ms": 1000 }
        }"#,
    )
    .unwrap();
    let (_created, factory) = counting_factory();
    let spawner = TokioSpawner::current().unwrap();

    let (pool, coordinator) = build_pool_for_shutdown(&cfg, factory, AlwaysHealthy, &spawner).unwrap();
    assert_eq!(coordinator.hook_count(), 1);
    assert!(pool.monitor_running());

    let lease = pool.get_async().await.unwrap();
    pool.release(lease);

    let outcome = coordinator.run().await.unwrap();
    assert!(outcome.is_graceful());
    assert!(outcome.failures().is_empty());
    assert_eq!(coordinator.state(), ShutdownState::Completed);

    assert!(pool.is_closed());
    assert_eq!(pool.stats().idle, 0);
    let err = pool.acquire_async(Duration::from_millis(10)).await.unwrap_err();
    assert!(matches!(err, PoolError::Closed));

    for _ in 0..100 {
        if !pool.monitor_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!pool.monitor_running(), "monitor survived shutdown");
}

#[tokio::test]
async fn test_build_pool_for_shutdown_rejects_invalid_shutdown_section() {
    let mut cfg = LifecycleConfig::default();
    cfg.shutdown.deadline_ms = 0;
    let (_created, factory) = counting_factory();
    let spawner = TokioSpawner::current().unwrap();

    let err = build_pool_for_shutdown(&cfg, factory, AlwaysHealthy, &spawner).unwrap_err();

    match err {
        PoolError::InvalidConfig(msg) => assert!(msg.starts_with("shutdown invalid:"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}
