//! Tokio runtime spawner implementation.

use std::future::Future;

use tokio::runtime::Handle;

use crate::core::{PoolError, Spawn};

/// Tokio-based spawner that runs background work on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Create a new `TokioSpawner` from a tokio runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner for the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Runtime` when called outside a tokio runtime.
    pub fn current() -> Result<Self, PoolError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| PoolError::Runtime(e.to_string()))
    }

    /// The underlying runtime handle.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(fut));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime_fails() {
        let err = TokioSpawner::current().unwrap_err();
        assert!(matches!(err, PoolError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_spawned_future_runs() {
        let spawner = TokioSpawner::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawner.spawn(async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }
}
