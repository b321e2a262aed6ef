//! Runtime adapters hosting the pool's background monitor.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
