//! Caller-supplied capabilities the pool depends on.
//!
//! The pool never opens connections or probes endpoints itself. Creating a
//! resource and deciding whether it is still usable are delegated to a
//! [`ResourceFactory`] and a [`HealthChecker`] supplied at construction.

use super::AppResult;

/// Produces new resource instances for a pool.
///
/// Called synchronously while seeding, when an unhealthy resource is replaced
/// during acquire, and from the background monitor. Failures are never fatal
/// to the pool; they shrink its effective capacity until a later call succeeds.
///
/// Closures returning `anyhow::Result<R>` implement this trait:
///
/// ```rust
/// use prometheus_lifecycle::core::ResourceFactory;
///
/// let factory = || -> anyhow::Result<String> { Ok("conn".to_string()) };
/// assert_eq!(factory.create().unwrap(), "conn");
/// ```
pub trait ResourceFactory<R>: Send + Sync + 'static {
    /// Create a new resource or report why it could not be created.
    fn create(&self) -> AppResult<R>;
}

impl<R, F> ResourceFactory<R> for F
where
    F: Fn() -> AppResult<R> + Send + Sync + 'static,
{
    fn create(&self) -> AppResult<R> {
        self()
    }
}

/// Decides whether a resource is still usable.
///
/// Called before every lease and periodically on idle resources. It only
/// ever sees resources the pool exclusively owns at that moment.
pub trait HealthChecker<R>: Send + Sync + 'static {
    /// Return `true` if the resource may be handed out.
    fn is_healthy(&self, resource: &R) -> bool;
}

impl<R, F> HealthChecker<R> for F
where
    F: Fn(&R) -> bool + Send + Sync + 'static,
{
    fn is_healthy(&self, resource: &R) -> bool {
        self(resource)
    }
}

/// Health checker that accepts every resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

impl<R> HealthChecker<R> for AlwaysHealthy {
    fn is_healthy(&self, _resource: &R) -> bool {
        true
    }
}
