//! Core lifecycle primitives: the resource pool and the shutdown coordinator.

pub mod capability;
pub mod error;
pub mod resource_pool;
pub mod shutdown;

pub use capability::{AlwaysHealthy, HealthChecker, ResourceFactory};
pub use error::{AppResult, HookFailure, PoolError, ShutdownError};
pub use resource_pool::{Lease, PoolStats, ResourceId, ResourcePool, Spawn};
pub use shutdown::{ShutdownCoordinator, ShutdownHook, ShutdownOutcome, ShutdownState};
