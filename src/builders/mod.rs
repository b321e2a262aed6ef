//! Builders to construct lifecycle components from configuration.

pub mod pool_builder;

pub use pool_builder::{build_coordinator, build_pool, build_pool_for_shutdown};
