//! Error types for pool and shutdown operations.

use std::time::Duration;

use thiserror::Error;

use crate::core::shutdown::ShutdownState;

/// Errors produced by the resource pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No idle resource became available within the bound.
    #[error("timed out after {timeout:?} waiting for an idle resource")]
    AcquireTimeout {
        /// The timeout the caller supplied.
        timeout: Duration,
    },
    /// An unhealthy resource was discarded and the factory could not replace it.
    #[error("replacement for unhealthy resource failed: {source}")]
    ReplacementFailed {
        /// Error reported by the resource factory.
        #[source]
        source: anyhow::Error,
    },
    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No runtime was available to host the background monitor.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl PoolError {
    /// Whether the caller may reasonably retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AcquireTimeout { .. } | Self::ReplacementFailed { .. })
    }
}

/// A shutdown hook that returned an error or panicked.
///
/// Failures are collected into the session outcome and never abort the
/// session or sibling hooks.
#[derive(Debug, Error)]
#[error("shutdown hook `{hook}` failed: {error}")]
pub struct HookFailure {
    /// Name the hook was registered under.
    pub hook: String,
    /// The reported failure.
    #[source]
    pub error: anyhow::Error,
}

/// Errors produced by the shutdown coordinator itself.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The coordinator is one-shot and has already left `Idle`.
    #[error("shutdown already triggered (state: {state:?})")]
    AlreadyTriggered {
        /// State observed when the trigger was attempted.
        state: ShutdownState,
    },
    /// Installing or awaiting a termination signal failed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
    /// The task running the shutdown session panicked or was cancelled.
    #[error("shutdown session failed: {0}")]
    Session(#[source] tokio::task::JoinError),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for caller-supplied capabilities.
pub type AppResult<T> = Result<T, anyhow::Error>;
