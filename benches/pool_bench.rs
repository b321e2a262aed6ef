//! Benchmarks for resource pooling and coordinated shutdown.
//!
//! Benchmarks cover:
//! - Uncontended acquire/release (blocking and async)
//! - Contended async acquire/release across tasks
//! - Replacement of unhealthy resources during acquire
//! - Shutdown sessions with many concurrent hooks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prometheus_lifecycle::config::{PoolConfig, ShutdownConfig};
use prometheus_lifecycle::core::{AlwaysHealthy, ResourcePool, ShutdownCoordinator};
use prometheus_lifecycle::runtime::TokioSpawner;

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn pool_config(capacity: usize) -> PoolConfig {
    PoolConfig::new()
        .with_capacity(capacity)
        .with_acquire_timeout(Duration::from_secs(5))
        .with_monitor_interval(Duration::from_secs(3600))
}

fn counter_pool(rt: &Runtime, capacity: usize) -> ResourcePool<u64> {
    let next = AtomicU64::new(0);
    let spawner = TokioSpawner::new(rt.handle().clone());
    ResourcePool::new(
        pool_config(capacity),
        move || Ok(next.fetch_add(1, Ordering::Relaxed)),
        AlwaysHealthy,
        &spawner,
    )
    .unwrap()
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn bench_acquire_release_blocking(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = counter_pool(&rt, 8);

    c.bench_function("acquire_release_blocking", |b| {
        b.iter(|| {
            let lease = pool.acquire(Duration::from_secs(1)).unwrap();
            black_box(*lease);
            pool.release(lease);
        });
    });
}

fn bench_acquire_release_async(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = counter_pool(&rt, 8);

    c.bench_function("acquire_release_async", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let lease = pool.acquire_async(Duration::from_secs(1)).await.unwrap();
                black_box(*lease);
                pool.release(lease);
            }
        });
    });
}

fn bench_contended_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_acquire_release");
    let rt = Runtime::new().unwrap();
    const OPS_PER_TASK: u64 = 100;

    for tasks in [4_u64, 16, 64] {
        let pool = counter_pool(&rt, 4);
        group.throughput(Throughput::Elements(tasks * OPS_PER_TASK));
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.to_async(&rt).iter(|| {
                let pool = pool.clone();
                async move {
                    let mut handles = Vec::new();
                    for _ in 0..tasks {
                        let pool = pool.clone();
                        handles.push(tokio::spawn(async move {
                            for _ in 0..OPS_PER_TASK {
                                let lease = pool.acquire_async(Duration::from_secs(5)).await.unwrap();
                                black_box(*lease);
                                pool.release(lease);
                            }
                        }));
                    }
                    for handle in handles {
                        handle.await.unwrap();
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_acquire_with_replacement(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let spawner = TokioSpawner::new(rt.handle().clone());
    let healthy = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&healthy);
    let next = AtomicU64::new(0);

    // Every resource is born healthy and reported unhealthy once the flag
    // drops, so each acquire pays for one check plus one replacement.
    let pool = ResourcePool::new(
        pool_config(1),
        move || Ok(next.fetch_add(1, Ordering::Relaxed)),
        move |_: &u64| flag.swap(true, Ordering::Relaxed),
        &spawner,
    )
    .unwrap();

    c.bench_function("acquire_with_replacement", |b| {
        b.iter(|| {
            healthy.store(false, Ordering::Relaxed);
            let lease = pool.acquire(Duration::from_secs(1)).unwrap();
            black_box(*lease);
            pool.release(lease);
        });
    });
}

// ============================================================================
// Shutdown Benchmarks
// ============================================================================

fn bench_shutdown_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("shutdown_session");

    for hooks in [1_usize, 16, 128] {
        group.throughput(Throughput::Elements(hooks as u64));
        group.bench_with_input(BenchmarkId::from_parameter(hooks), &hooks, |b, &hooks| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let coordinator =
                    ShutdownCoordinator::new(ShutdownConfig::with_deadline(Duration::from_secs(5)));
                for i in 0..hooks {
                    coordinator.register_fn(format!("hook-{i}"), |_token| async {
                        tokio::task::yield_now().await;
                        Ok(())
                    });
                }
                let outcome = coordinator.run().await.unwrap();
                black_box(outcome.is_graceful());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    pool_benches,
    bench_acquire_release_blocking,
    bench_acquire_release_async,
    bench_contended_async,
    bench_acquire_with_replacement
);

criterion_group!(shutdown_benches, bench_shutdown_session);

criterion_main!(pool_benches, shutdown_benches);
