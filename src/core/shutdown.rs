//! Coordinated shutdown: run registered cleanup hooks concurrently under a
//! deadline and aggregate their failures.
//!
//! The coordinator is one-shot. It moves `Idle → Triggered` on the first
//! trigger and ends in either `Completed` (every hook returned before the
//! deadline) or `TimedOut` (the deadline elapsed first).
//!
//! Cancellation is cooperative. Every hook in a session receives the same
//! [`CancellationToken`], which is cancelled when the deadline elapses. A hook
//! that ignores the token keeps running on the runtime; the coordinator simply
//! stops waiting for it.
//!
//! ```rust,ignore
//! use prometheus_lifecycle::config::ShutdownConfig;
//! use prometheus_lifecycle::core::ShutdownCoordinator;
//!
//! let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
//! coordinator.register_fn("close-db", |token| async move {
//!     tokio::select! {
//!         () = token.cancelled() => anyhow::bail!("deadline reached before close"),
//!         () = db.close() => Ok(()),
//!     }
//! });
//!
//! let outcome = coordinator.wait_for_signal().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ShutdownConfig;
use crate::core::{AppResult, HookFailure, ShutdownError};

/// A unit of cleanup work run during coordinated shutdown.
#[async_trait]
pub trait ShutdownHook: Send + Sync + 'static {
    /// Run the cleanup.
    ///
    /// `token` is cancelled when the session deadline elapses. Implementations
    /// are expected to honour it promptly; the coordinator cannot stop them.
    async fn run(&self, token: CancellationToken) -> AppResult<()>;
}

/// Adapter turning a closure into a [`ShutdownHook`].
struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> ShutdownHook for FnHook<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn run(&self, token: CancellationToken) -> AppResult<()> {
        (self.0)(token).await
    }
}

/// Lifecycle state of a [`ShutdownCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    /// No shutdown has been requested yet.
    Idle,
    /// Hooks are running.
    Triggered,
    /// Every hook finished before the deadline.
    Completed,
    /// The deadline elapsed with hooks still running.
    TimedOut,
}

/// Verdict of a shutdown session.
#[derive(Debug)]
pub enum ShutdownOutcome {
    /// Every hook finished before the deadline.
    Completed {
        /// Hook failures in completion order.
        failures: Vec<HookFailure>,
    },
    /// The deadline elapsed first; remaining hooks were abandoned.
    TimedOut {
        /// Failures from hooks that did finish, in completion order.
        failures: Vec<HookFailure>,
        /// Names of hooks still running at the deadline.
        pending: Vec<String>,
    },
}

impl ShutdownOutcome {
    /// Whether every hook finished before the deadline.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Failures collected from hooks that finished.
    #[must_use]
    pub fn failures(&self) -> &[HookFailure] {
        match self {
            Self::Completed { failures } | Self::TimedOut { failures, .. } => failures,
        }
    }

    /// Hooks abandoned at the deadline. Empty for a graceful shutdown.
    #[must_use]
    pub fn pending(&self) -> &[String] {
        match self {
            Self::Completed { .. } => &[],
            Self::TimedOut { pending, .. } => pending,
        }
    }

    /// Terminal coordinator state this outcome corresponds to.
    #[must_use]
    pub const fn state(&self) -> ShutdownState {
        match self {
            Self::Completed { .. } => ShutdownState::Completed,
            Self::TimedOut { .. } => ShutdownState::TimedOut,
        }
    }
}

#[derive(Clone)]
struct RegisteredHook {
    name: Arc<str>,
    hook: Arc<dyn ShutdownHook>,
}

/// Registry of cleanup hooks with a one-shot, deadline-bounded trigger.
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    hooks: Mutex<Vec<RegisteredHook>>,
    /// Lock order: `hooks` before `state`.
    state: Arc<Mutex<ShutdownState>>,
    shutdown_token: CancellationToken,
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("config", &self.config)
            .field("hooks", &self.hook_count())
            .field("state", &self.state())
            .finish()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(ShutdownConfig::default())
    }
}

impl ShutdownCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            hooks: Mutex::new(Vec::new()),
            state: Arc::new(Mutex::new(ShutdownState::Idle)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Register a cleanup hook.
    ///
    /// Hooks registered after the coordinator has been triggered are kept
    /// but never run.
    pub fn register_hook<H: ShutdownHook>(&self, name: impl Into<String>, hook: H) {
        let name: Arc<str> = Arc::from(name.into());
        let mut hooks = self.hooks.lock();
        let state = self.state();
        if state != ShutdownState::Idle {
            warn!(hook = %name, ?state, "hook registered after shutdown was triggered; it will not run");
        }
        hooks.push(RegisteredHook {
            name,
            hook: Arc::new(hook),
        });
    }

    /// Register a closure as a cleanup hook.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.register_hook(name, FnHook(hook));
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    /// Token cancelled as soon as shutdown is triggered.
    ///
    /// Long-lived tasks can derive child tokens from it to stop when
    /// shutdown begins.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Default deadline from configuration.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.config.deadline()
    }

    /// Trigger shutdown with the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownError::AlreadyTriggered` if called more than once.
    pub async fn run(&self) -> Result<ShutdownOutcome, ShutdownError> {
        self.trigger(self.config.deadline()).await
    }

    /// Run every registered hook concurrently and wait at most `deadline`.
    ///
    /// A deadline too large to represent (such as `Duration::MAX`) waits for
    /// every hook. The session runs on its own task: if the returned future is
    /// dropped, hooks keep running under the deadline and the coordinator
    /// still reaches a terminal state.
    ///
    /// # Errors
    ///
    /// - `ShutdownError::AlreadyTriggered` if called more than once
    /// - `ShutdownError::Session` if the session task itself failed
    pub async fn trigger(&self, deadline: Duration) -> Result<ShutdownOutcome, ShutdownError> {
        let hooks = {
            let hooks = self.hooks.lock();
            let mut state = self.state.lock();
            if *state != ShutdownState::Idle {
                return Err(ShutdownError::AlreadyTriggered { state: *state });
            }
            *state = ShutdownState::Triggered;
            hooks.clone()
        };
        self.shutdown_token.cancel();

        let state = Arc::clone(&self.state);
        let session = tokio::spawn(async move {
            let outcome = ShutdownSession::new(deadline, hooks).run().await;
            *state.lock() = outcome.state();
            outcome
        });

        match session.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "shutdown session task failed");
                *self.state.lock() = ShutdownState::TimedOut;
                Err(ShutdownError::Session(e))
            }
        }
    }

    /// Wait for SIGINT (Ctrl-C) or, on unix, SIGTERM, then trigger shutdown
    /// with the configured deadline.
    ///
    /// # Errors
    ///
    /// - `ShutdownError::Signal` if a signal handler cannot be installed
    /// - `ShutdownError::AlreadyTriggered` if shutdown was triggered elsewhere
    #[cfg(feature = "signal")]
    pub async fn wait_for_signal(&self) -> Result<ShutdownOutcome, ShutdownError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate = signal(SignalKind::terminate())?;
            tokio::select! {
                res = tokio::signal::ctrl_c() => res?,
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await?;

        info!("shutdown signal received, cleaning up");
        self.run().await
    }
}

/// One execution of the registered hooks.
struct ShutdownSession {
    id: Uuid,
    deadline: Duration,
    hooks: Vec<RegisteredHook>,
    token: CancellationToken,
}

impl ShutdownSession {
    fn new(deadline: Duration, hooks: Vec<RegisteredHook>) -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline,
            hooks,
            token: CancellationToken::new(),
        }
    }

    async fn run(self) -> ShutdownOutcome {
        let started = tokio::time::Instant::now();
        let deadline_at = started.checked_add(self.deadline);
        info!(
            session_id = %self.id,
            hooks = self.hooks.len(),
            deadline_ms = self.deadline.as_millis(),
            "shutdown triggered"
        );

        let names: Vec<Arc<str>> = self.hooks.iter().map(|h| Arc::clone(&h.name)).collect();
        let mut finished = vec![false; names.len()];
        let mut failures = Vec::new();
        let mut set = JoinSet::new();

        for (idx, registered) in self.hooks.into_iter().enumerate() {
            let token = self.token.clone();
            set.spawn(async move {
                let result = AssertUnwindSafe(registered.hook.run(token))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(anyhow::anyhow!("hook panicked: {}", panic_message(&*panic))));
                (idx, result)
            });
        }

        let collecting = collect(&mut set, &names, &mut finished, &mut failures);
        let drained = match deadline_at {
            Some(deadline_at) => tokio::time::timeout_at(deadline_at, collecting).await.is_ok(),
            None => {
                collecting.await;
                true
            }
        };

        let elapsed_ms = started.elapsed().as_millis();
        if drained {
            info!(session_id = %self.id, elapsed_ms, failures = failures.len(), "graceful shutdown completed");
            ShutdownOutcome::Completed { failures }
        } else {
            self.token.cancel();
            // Abandon, don't abort: stragglers keep their cancelled token and
            // may still clean up after we stop waiting.
            set.detach_all();
            let pending: Vec<String> = names
                .iter()
                .zip(&finished)
                .filter(|(_, done)| !**done)
                .map(|(name, _)| name.to_string())
                .collect();
            warn!(
                session_id = %self.id,
                elapsed_ms,
                pending = ?pending,
                "shutdown deadline exceeded, forcing exit"
            );
            ShutdownOutcome::TimedOut { failures, pending }
        }
    }
}

/// Drain finished hooks in completion order.
async fn collect(
    set: &mut JoinSet<(usize, AppResult<()>)>,
    names: &[Arc<str>],
    finished: &mut [bool],
    failures: &mut Vec<HookFailure>,
) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => {
                finished[idx] = true;
                if let Err(error) = result {
                    error!(hook = %names[idx], error = %error, "cleanup hook failed");
                    failures.push(HookFailure {
                        hook: names[idx].to_string(),
                        error,
                    });
                }
            }
            // Panics are caught inside the task and hooks are never aborted.
            Err(e) => warn!(error = %e, "shutdown hook task ended unexpectedly"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
