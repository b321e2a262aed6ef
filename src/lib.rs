//! # Prometheus Lifecycle
//!
//! Resource lifecycle primitives for long-running Prometheus AI services.
//!
//! Two independent pieces live here:
//!
//! - **`ResourcePool`**: a bounded pool of caller-created resources (model
//!   handles, connections, sessions). Every lease is health-checked before it
//!   is handed out, unhealthy resources are replaced through the caller's
//!   factory, and a cancellable background monitor cycles idle resources
//!   through the same check.
//! - **`ShutdownCoordinator`**: a registry of cleanup hooks that run
//!   concurrently under a deadline when the process terminates. Hook failures
//!   are collected rather than propagated, and the outcome says whether the
//!   shutdown was graceful or forced.
//!
//! Nothing in either piece is fatal: factory failures shrink the pool until a
//! later replacement succeeds, and hook failures are reported as data.
//!
//! ## ResourcePool
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_lifecycle::config::PoolConfig;
//! use prometheus_lifecycle::core::ResourcePool;
//! use prometheus_lifecycle::runtime::TokioSpawner;
//!
//! let pool = ResourcePool::new(
//!     PoolConfig::new().with_capacity(4),
//!     || Connection::open("db:5432"),       // anyhow::Result<Connection>
//!     |conn: &Connection| conn.ping(),       // bool
//!     &TokioSpawner::current()?,
//! )?;
//!
//! let conn = pool.acquire_async(Duration::from_millis(500)).await?;
//! conn.query("SELECT 1")?;
//! pool.release(conn);
//! ```
//!
//! ## ShutdownCoordinator
//!
//! ```rust,ignore
//! use prometheus_lifecycle::config::ShutdownConfig;
//! use prometheus_lifecycle::core::ShutdownCoordinator;
//!
//! let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
//! let drain = pool.clone();
//! coordinator.register_fn("pool", move |_token| {
//!     let pool = drain.clone();
//!     async move {
//!         pool.close();
//!         Ok(())
//!     }
//! });
//!
//! let outcome = coordinator.wait_for_signal().await?;
//! for failure in outcome.failures() {
//!     tracing::error!(%failure, "cleanup failed");
//! }
//! ```
//!
//! For complete examples, see:
//! - `tests/resource_pool_test.rs` - pool integration tests
//! - `tests/shutdown_test.rs` - coordinator integration tests

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core lifecycle primitives and their error types.
pub mod core;
/// Configuration models for pools and shutdown deadlines.
pub mod config;
/// Builders to construct lifecycle components from configuration.
pub mod builders;
/// Runtime adapters for hosting background work.
pub mod runtime;
/// Shared utilities.
pub mod util;
