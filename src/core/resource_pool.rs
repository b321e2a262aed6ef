//! Bounded, health-checked resource pool with a cancellable background monitor.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::{HealthChecker, PoolError, ResourceFactory};

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Pool-unique identity of a resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// Statistics about pool occupancy and churn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured capacity.
    pub capacity: usize,
    /// Resources currently idle.
    pub idle: usize,
    /// Leases currently outstanding.
    pub leased: usize,
    /// Resources created by the factory, including seeds.
    pub created: u64,
    /// Factory calls that failed.
    pub create_failures: u64,
    /// Health checks that reported a resource unusable.
    pub unhealthy: u64,
    /// Acquires that failed because no replacement could be created.
    pub replacement_failures: u64,
    /// Acquires that timed out.
    pub acquire_timeouts: u64,
    /// Released resources dropped because the idle set was full or closed.
    pub dropped_on_release: u64,
    /// Leases dropped without being released.
    pub lost_leases: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicU64,
    create_failures: AtomicU64,
    unhealthy: AtomicU64,
    replacement_failures: AtomicU64,
    acquire_timeouts: AtomicU64,
    dropped_on_release: AtomicU64,
    lost_leases: AtomicU64,
}

/// An idle resource together with the bookkeeping the pool keeps for it.
struct Entry<R> {
    id: ResourceId,
    resource: R,
    created_at: Instant,
}

/// Idle set and lease accounting. Only ever touched under `PoolInner::state`.
struct PoolState<R> {
    idle: VecDeque<Entry<R>>,
    leased: usize,
    closed: bool,
}

impl<R> PoolState<R> {
    /// Move the front idle entry into the leased state.
    fn take_idle(&mut self) -> Result<Option<Entry<R>>, PoolError> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        let entry = self.idle.pop_front();
        if entry.is_some() {
            self.leased += 1;
        }
        Ok(entry)
    }
}

struct PoolInner<R: 'static> {
    config: PoolConfig,
    factory: Box<dyn ResourceFactory<R>>,
    checker: Box<dyn HealthChecker<R>>,
    state: Mutex<PoolState<R>>,
    /// Wakes threads blocked in `acquire`.
    available: Condvar,
    /// Wakes tasks suspended in `acquire_async`.
    notify: Notify,
    counters: PoolCounters,
    next_id: AtomicU64,
    monitor_token: CancellationToken,
    monitor_running: AtomicBool,
}

impl<R: 'static> PoolInner<R> {
    /// Call the factory and wrap the result in a fresh entry.
    fn create_entry(&self) -> Result<Entry<R>, anyhow::Error> {
        match self.factory.create() {
            Ok(resource) => {
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
                Ok(Entry {
                    id,
                    resource,
                    created_at: Instant::now(),
                })
            }
            Err(e) => {
                self.counters.create_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn is_healthy(&self, entry: &Entry<R>) -> bool {
        let healthy = self.checker.is_healthy(&entry.resource);
        if !healthy {
            self.counters.unhealthy.fetch_add(1, Ordering::Relaxed);
        }
        healthy
    }

    fn wake_one(&self) {
        self.available.notify_one();
        self.notify.notify_one();
    }

    /// Put an entry back into the idle set if there is room.
    ///
    /// Returns the entry when it was rejected so the caller drops it outside
    /// the lock.
    fn push_idle(&self, entry: Entry<R>) -> Option<Entry<R>> {
        let mut state = self.state.lock();
        if state.closed || state.idle.len() >= self.config.capacity {
            return Some(entry);
        }
        state.idle.push_back(entry);
        drop(state);
        self.wake_one();
        None
    }

    fn release_reservation(&self) {
        let mut state = self.state.lock();
        state.leased = state.leased.saturating_sub(1);
    }

    /// One monitor cycle: inspect the front idle resource, replacing it if it
    /// fails its health check.
    fn inspect_one(&self) {
        let entry = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.idle.pop_front()
        };
        let Some(entry) = entry else {
            return;
        };

        let entry = if self.is_healthy(&entry) {
            entry
        } else {
            debug!(
                resource_id = %entry.id,
                age_ms = entry.created_at.elapsed().as_millis(),
                "monitor discarding unhealthy idle resource"
            );
            drop(entry);
            match self.create_entry() {
                Ok(replacement) => {
                    debug!(resource_id = %replacement.id, "monitor created replacement");
                    replacement
                }
                Err(e) => {
                    warn!(error = %e, "monitor failed to replace unhealthy resource; slot left empty");
                    return;
                }
            }
        };

        if let Some(rejected) = self.push_idle(entry) {
            debug!(resource_id = %rejected.id, "idle set unavailable after inspection; dropping resource");
        }
    }
}

impl<R: 'static> Drop for PoolInner<R> {
    fn drop(&mut self) {
        self.monitor_token.cancel();
    }
}

/// A resource leased from a [`ResourcePool`].
///
/// The lease exclusively owns the resource until it is handed back with
/// [`ResourcePool::release`]. Dropping a lease without releasing it loses the
/// resource: it is dropped and stops counting against the pool's capacity.
pub struct Lease<R: 'static> {
    entry: Option<Entry<R>>,
    pool: Weak<PoolInner<R>>,
}

impl<R: 'static> Lease<R> {
    /// Identity of the leased resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        match &self.entry {
            Some(entry) => entry.id,
            None => unreachable!("lease entry taken twice"),
        }
    }

    /// Detach the resource from the pool for good.
    ///
    /// The pool stops counting it as leased and will never see it again.
    #[must_use]
    pub fn into_inner(mut self) -> R {
        let entry = self.entry.take();
        if let Some(pool) = self.pool.upgrade() {
            pool.release_reservation();
            pool.wake_one();
        }
        match entry {
            Some(entry) => entry.resource,
            // A lease only loses its entry inside `release`/`into_inner`,
            // both of which consume it.
            None => unreachable!("lease entry taken twice"),
        }
    }

    fn belongs_to(&self, inner: &Arc<PoolInner<R>>) -> bool {
        std::ptr::eq(self.pool.as_ptr(), Arc::as_ptr(inner))
    }
}

impl<R: 'static> Deref for Lease<R> {
    type Target = R;

    fn deref(&self) -> &R {
        match &self.entry {
            Some(entry) => &entry.resource,
            None => unreachable!("lease entry taken twice"),
        }
    }
}

impl<R: 'static> DerefMut for Lease<R> {
    fn deref_mut(&mut self) -> &mut R {
        match &mut self.entry {
            Some(entry) => &mut entry.resource,
            None => unreachable!("lease entry taken twice"),
        }
    }
}

impl<R: fmt::Debug + 'static> fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id())
            .field("resource", &self.entry.as_ref().map(|e| &e.resource))
            .finish()
    }
}

impl<R: 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        if let Some(pool) = self.pool.upgrade() {
            pool.release_reservation();
            pool.counters.lost_leases.fetch_add(1, Ordering::Relaxed);
            pool.wake_one();
            warn!(resource_id = %entry.id, "lease dropped without release; resource lost");
        }
    }
}

/// Bounded pool of health-checked resources.
///
/// Cloning the pool yields another handle to the same idle set. The
/// background monitor exits once the last handle is dropped, the pool is
/// closed, or [`ResourcePool::stop_monitor`] is called.
///
/// The factory and health checker run on the calling thread or task during
/// acquire. The acquire timeout only bounds the wait for an idle resource;
/// a health check or replacement started after one is obtained runs to
/// completion regardless of the remaining budget.
pub struct ResourcePool<R: 'static> {
    inner: Arc<PoolInner<R>>,
}

impl<R: 'static> Clone for ResourcePool<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: 'static> fmt::Debug for ResourcePool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> ResourcePool<R> {
    /// Create a pool, seed it from the factory and start the monitor.
    ///
    /// Factory failures while seeding are logged and leave that slot empty.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn new<F, H, S>(config: PoolConfig, factory: F, checker: H, spawner: &S) -> Result<Self, PoolError>
    where
        F: ResourceFactory<R>,
        H: HealthChecker<R>,
        S: Spawn,
    {
        Self::with_cancellation(config, factory, checker, spawner, &CancellationToken::new())
    }

    /// Like [`ResourcePool::new`], but the monitor also stops when `parent`
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn with_cancellation<F, H, S>(
        config: PoolConfig,
        factory: F,
        checker: H,
        spawner: &S,
        parent: &CancellationToken,
    ) -> Result<Self, PoolError>
    where
        F: ResourceFactory<R>,
        H: HealthChecker<R>,
        S: Spawn,
    {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let capacity = config.capacity;
        let inner = Arc::new(PoolInner {
            config,
            factory: Box::new(factory),
            checker: Box::new(checker),
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(capacity),
                leased: 0,
                closed: false,
            }),
            available: Condvar::new(),
            notify: Notify::new(),
            counters: PoolCounters::default(),
            next_id: AtomicU64::new(0),
            monitor_token: parent.child_token(),
            monitor_running: AtomicBool::new(true),
        });

        let mut seeded = 0;
        for slot in 0..capacity {
            match inner.create_entry() {
                Ok(entry) => {
                    inner.state.lock().idle.push_back(entry);
                    seeded += 1;
                }
                Err(e) => warn!(slot, error = %e, "failed to seed pool slot; starting empty"),
            }
        }

        spawner.spawn(run_monitor(
            Arc::downgrade(&inner),
            inner.monitor_token.clone(),
            inner.config.monitor_interval(),
        ));

        info!(
            capacity,
            seeded,
            monitor_interval_ms = inner.config.monitor_interval_ms,
            "resource pool initialized"
        );

        Ok(Self { inner })
    }
}

impl<R: 'static> ResourcePool<R> {
    /// Lease a resource, blocking the current thread for at most `timeout`.
    ///
    /// A timeout too large to form a deadline (such as `Duration::MAX`)
    /// waits without bound. Do not call this from inside an async task; use
    /// [`ResourcePool::acquire_async`] there.
    ///
    /// # Errors
    ///
    /// - `PoolError::AcquireTimeout` if nothing became idle in time
    /// - `PoolError::ReplacementFailed` if the obtained resource was unhealthy
    ///   and the factory failed
    /// - `PoolError::Closed` if the pool has been closed
    pub fn acquire(&self, timeout: Duration) -> Result<Lease<R>, PoolError> {
        let deadline = Instant::now().checked_add(timeout);
        let entry = {
            let mut state = self.inner.state.lock();
            loop {
                if let Some(entry) = state.take_idle()? {
                    break entry;
                }
                let Some(deadline) = deadline else {
                    self.inner.available.wait(&mut state);
                    continue;
                };
                if self.inner.available.wait_until(&mut state, deadline).timed_out() {
                    // Last look: a release may have raced the timeout.
                    if let Some(entry) = state.take_idle()? {
                        break entry;
                    }
                    drop(state);
                    return Err(self.timed_out(timeout));
                }
            }
        };
        self.vet(entry)
    }

    /// Lease a resource, suspending the current task for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`ResourcePool::acquire`].
    pub async fn acquire_async(&self, timeout: Duration) -> Result<Lease<R>, PoolError> {
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        loop {
            // Register interest before looking so a release between the
            // check and the await is not missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let taken = self.inner.state.lock().take_idle()?;
            if let Some(entry) = taken {
                return self.vet(entry);
            }

            let Some(deadline) = deadline else {
                notified.await;
                continue;
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let taken = self.inner.state.lock().take_idle()?;
                return match taken {
                    Some(entry) => self.vet(entry),
                    None => Err(self.timed_out(timeout)),
                };
            }
        }
    }

    /// Blocking acquire using the configured acquire timeout.
    ///
    /// # Errors
    ///
    /// Same as [`ResourcePool::acquire`].
    pub fn get(&self) -> Result<Lease<R>, PoolError> {
        self.acquire(self.inner.config.acquire_timeout())
    }

    /// Async acquire using the configured acquire timeout.
    ///
    /// # Errors
    ///
    /// Same as [`ResourcePool::acquire`].
    pub async fn get_async(&self) -> Result<Lease<R>, PoolError> {
        self.acquire_async(self.inner.config.acquire_timeout()).await
    }

    /// Return a leased resource to the idle set.
    ///
    /// Never blocks. If the idle set is full or the pool is closed the
    /// resource is dropped instead.
    pub fn release(&self, mut lease: Lease<R>) {
        let Some(entry) = lease.entry.take() else {
            return;
        };
        if !lease.belongs_to(&self.inner) {
            warn!(resource_id = %entry.id, "lease released into a pool that did not issue it; dropping");
            // Settle the accounting of the pool that did issue it.
            if let Some(owner) = lease.pool.upgrade() {
                owner.release_reservation();
                owner.counters.dropped_on_release.fetch_add(1, Ordering::Relaxed);
                owner.wake_one();
            }
            return;
        }

        self.inner.release_reservation();
        if let Some(rejected) = self.inner.push_idle(entry) {
            self.inner
                .counters
                .dropped_on_release
                .fetch_add(1, Ordering::Relaxed);
            debug!(resource_id = %rejected.id, "idle set full or closed; dropping released resource");
            // Freed a leased slot without refilling idle; a waiter may be
            // able to see a replacement from the monitor.
            self.inner.wake_one();
        }
    }

    /// Stop the background monitor. Idempotent.
    pub fn stop_monitor(&self) {
        self.inner.monitor_token.cancel();
    }

    /// Whether the background monitor loop is still running.
    #[must_use]
    pub fn monitor_running(&self) -> bool {
        self.inner.monitor_running.load(Ordering::Acquire)
    }

    /// Close the pool: stop the monitor and drop every idle resource.
    ///
    /// Outstanding leases stay valid; releasing them afterwards drops the
    /// resource. Returns the number of idle resources drained.
    pub fn close(&self) -> usize {
        self.stop_monitor();
        let drained: Vec<Entry<R>> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.idle.drain(..).collect()
        };
        // Blocked acquirers must observe `closed` rather than wait out their timeout.
        self.inner.available.notify_all();
        self.inner.notify.notify_waiters();
        info!(drained = drained.len(), "resource pool closed");
        drained.len()
    }

    /// Whether [`ResourcePool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Snapshot of current occupancy and counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (idle, leased) = {
            let state = self.inner.state.lock();
            (state.idle.len(), state.leased)
        };
        let counters = &self.inner.counters;
        PoolStats {
            capacity: self.inner.config.capacity,
            idle,
            leased,
            created: counters.created.load(Ordering::Relaxed),
            create_failures: counters.create_failures.load(Ordering::Relaxed),
            unhealthy: counters.unhealthy.load(Ordering::Relaxed),
            replacement_failures: counters.replacement_failures.load(Ordering::Relaxed),
            acquire_timeouts: counters.acquire_timeouts.load(Ordering::Relaxed),
            dropped_on_release: counters.dropped_on_release.load(Ordering::Relaxed),
            lost_leases: counters.lost_leases.load(Ordering::Relaxed),
        }
    }

    fn timed_out(&self, timeout: Duration) -> PoolError {
        self.inner
            .counters
            .acquire_timeouts
            .fetch_add(1, Ordering::Relaxed);
        debug!(timeout_ms = timeout.as_millis(), "acquire timed out");
        PoolError::AcquireTimeout { timeout }
    }

    /// Health-check an entry already reserved as leased and hand it out,
    /// replacing it once if it is unhealthy.
    fn vet(&self, entry: Entry<R>) -> Result<Lease<R>, PoolError> {
        if self.inner.is_healthy(&entry) {
            return Ok(self.lease(entry));
        }

        debug!(resource_id = %entry.id, "idle resource failed health check on acquire; replacing");
        drop(entry);
        match self.inner.create_entry() {
            Ok(replacement) => {
                debug!(resource_id = %replacement.id, "leasing replacement resource");
                Ok(self.lease(replacement))
            }
            Err(source) => {
                self.inner.release_reservation();
                self.inner
                    .counters
                    .replacement_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %source, "replacement failed; pool is under capacity");
                Err(PoolError::ReplacementFailed { source })
            }
        }
    }

    fn lease(&self, entry: Entry<R>) -> Lease<R> {
        Lease {
            entry: Some(entry),
            pool: Arc::downgrade(&self.inner),
        }
    }
}

/// Background loop that inspects one idle resource per tick.
///
/// Holds only a weak reference so an abandoned pool is not kept alive by its
/// own monitor.
async fn run_monitor<R: Send + 'static>(
    pool: Weak<PoolInner<R>>,
    token: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval_ms = interval.as_millis(), "pool monitor started");

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = pool.upgrade() else {
            break;
        };
        // Health checks and the factory may block; keep them off the async workers.
        let checked = Arc::clone(&inner);
        if let Err(e) = tokio::task::spawn_blocking(move || checked.inspect_one()).await {
            warn!(error = %e, "pool monitor inspection panicked");
        }
        if inner.state.lock().closed {
            break;
        }
    }

    if let Some(inner) = pool.upgrade() {
        inner.monitor_running.store(false, Ordering::Release);
    }
    debug!("pool monitor stopped");
}
