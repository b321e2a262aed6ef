//! Configuration models for pools and shutdown deadlines.

pub mod lifecycle;

pub use lifecycle::{LifecycleConfig, PoolConfig, ShutdownConfig};
