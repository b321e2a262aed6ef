//! Builders to construct a resource pool and shutdown coordinator from configuration.

use crate::config::{LifecycleConfig, PoolConfig, ShutdownConfig};
use crate::core::{
    HealthChecker, PoolError, ResourceFactory, ResourcePool, ShutdownCoordinator, ShutdownError,
    Spawn,
};

/// Build a resource pool from configuration using the provided capabilities.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if the configuration is invalid.
pub fn build_pool<R, F, H, S>(
    cfg: &PoolConfig,
    factory: F,
    checker: H,
    spawner: &S,
) -> Result<ResourcePool<R>, PoolError>
where
    R: Send + 'static,
    F: ResourceFactory<R>,
    H: HealthChecker<R>,
    S: Spawn,
{
    ResourcePool::new(cfg.clone(), factory, checker, spawner)
}

/// Build a shutdown coordinator from configuration.
///
/// # Errors
///
/// Returns `ShutdownError::InvalidConfig` if the deadline is invalid.
pub fn build_coordinator(cfg: &ShutdownConfig) -> Result<ShutdownCoordinator, ShutdownError> {
    cfg.validate().map_err(ShutdownError::InvalidConfig)?;
    Ok(ShutdownCoordinator::new(cfg.clone()))
}

/// Build a coordinator and a pool wired to it.
///
/// The pool's monitor stops as soon as shutdown is triggered, and a hook
/// named `resource-pool` closes the pool during shutdown.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if any section is invalid.
pub fn build_pool_for_shutdown<R, F, H, S>(
    cfg: &LifecycleConfig,
    factory: F,
    checker: H,
    spawner: &S,
) -> Result<(ResourcePool<R>, ShutdownCoordinator), PoolError>
where
    R: Send + 'static,
    F: ResourceFactory<R>,
    H: HealthChecker<R>,
    S: Spawn,
{
    cfg.validate().map_err(PoolError::InvalidConfig)?;

    let coordinator = ShutdownCoordinator::new(cfg.shutdown.clone());
    let pool = ResourcePool::with_cancellation(
        cfg.pool.clone(),
        factory,
        checker,
        spawner,
        &coordinator.shutdown_token(),
    )?;

    let hook_pool = pool.clone();
    coordinator.register_fn("resource-pool", move |_token| {
        let pool = hook_pool.clone();
        async move {
            let drained = pool.close();
            tracing::debug!(drained, "resource pool drained by shutdown hook");
            Ok(())
        }
    });

    Ok((pool, coordinator))
}
