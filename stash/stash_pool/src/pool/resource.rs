//! Resource pooling for reusable resources like connections, sessions, etc.
//!
//! A [`Pool`] tracks every resource it has handed out in an in-use registry
//! and every resource waiting for reuse in an idle registry. Checkout prefers
//! a validated idle resource and only creates a new one when none is usable;
//! return parks the resource as idle. A background reaper expires resources
//! that have been idle for longer than the configured timeout.
//!
//! One mutex per pool covers both registries. Checkout, return and every
//! reaper sweep hold it for their whole critical section, including the
//! calls into the [`Manager`].
//!
//! ```
//! use std::io;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use stash_core::{FnManager, PoolConfig};
//! use stash_pool::Pool;
//!
//! let next = AtomicU32::new(1);
//! let manager = FnManager::new(
//!     move || Ok::<_, io::Error>(next.fetch_add(1, Ordering::Relaxed)),
//!     |_conn: &mut u32| true,
//!     |_conn| Ok(()),
//! );
//! let pool = Pool::new(manager, PoolConfig::default()).unwrap();
//!
//! let conn = pool.checkout().unwrap();
//! assert_eq!(*conn, 1);
//! pool.return_resource(conn);
//!
//! // The idle connection is reused rather than creating a new one.
//! assert_eq!(*pool.checkout().unwrap(), 1);
//! ```

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use stash_core::error::{BuildError, PoolError};
use stash_core::id::{PoolId, ResourceId};
use stash_core::traits::Manager;
use stash_core::utils::config::PoolConfig;

use super::lease::{Lease, LeaseGuard, Reclaim};
use super::reaper::Reaper;
use super::registry::{IdleEntry, IdleRegistry, InUseRegistry};

/// Statistics about a pool
#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    /// Resources currently checked out
    pub in_use: usize,

    /// Resources currently waiting for reuse
    pub idle: usize,

    /// Total number of resources created
    pub created: usize,

    /// Total number of checkouts served by an idle resource
    pub reused: usize,

    /// Total number of resources handed back to the pool
    pub returned: usize,

    /// Total number of resources passed to `expire`
    pub expired: usize,

    /// Number of `expire` calls that reported an error
    pub expire_failures: usize,

    /// Resources evicted by the reaper for exceeding the idle timeout
    pub reaped: usize,

    /// Leases dropped without being returned
    pub abandoned: usize,

    /// When the most recent checkout began
    pub last_checkout: Option<Instant>,
}

/// Everything guarded by the pool mutex.
struct PoolState<R> {
    in_use: InUseRegistry,
    idle: IdleRegistry<R>,
    stats: PoolStats,
    shut_down: bool,
}

impl<R> PoolState<R> {
    fn new() -> Self {
        Self {
            in_use: InUseRegistry::default(),
            idle: IdleRegistry::default(),
            stats: PoolStats::default(),
            shut_down: false,
        }
    }
}

/// State shared between a pool, its reaper and outstanding guards.
pub(crate) struct Shared<M: Manager> {
    id: PoolId,
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Resource>>,
}

impl<M: Manager> Shared<M> {
    fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            id: PoolId::new(),
            manager,
            config,
            state: Mutex::new(PoolState::new()),
        }
    }

    fn checkout(self: &Arc<Self>) -> Result<Lease<M::Resource>, PoolError<M::Error>> {
        let mut state = self.state.lock();

        if state.shut_down {
            trace!("Checkout refused, pool {} is shut down", self.id);
            return Err(PoolError::ShutDown);
        }

        let now = Instant::now();
        state.stats.last_checkout = Some(now);

        while let Some(IdleEntry {
            id, mut resource, ..
        }) = state.idle.pop_most_recent()
        {
            if self.manager.validate(&mut resource) {
                trace!("Reusing idle resource {}", id);
                state.in_use.insert(id, now);
                state.stats.reused += 1;
                return Ok(self.lease(id, resource));
            }

            debug!("Discarding idle resource {} that failed validation", id);
            self.expire_quietly(&mut state.stats, id, resource);
        }

        let resource = self.manager.create().map_err(|e| {
            warn!("Failed to create resource for pool {}: {}", self.id, e);
            PoolError::Create(e)
        })?;

        let id = ResourceId::new();
        debug!("Created resource {} on demand", id);
        state.in_use.insert(id, now);
        state.stats.created += 1;

        Ok(self.lease(id, resource))
    }

    pub(crate) fn return_lease(&self, lease: Lease<M::Resource>) {
        let (id, pool_id) = (lease.id, lease.pool_id);
        let resource = lease.take_resource();

        let mut state = self.state.lock();

        let known = pool_id == self.id && state.in_use.remove(&id).is_some();
        let id = if known {
            id
        } else {
            // Never let a stray id collide with one already tracked.
            let adopted = ResourceId::new();
            warn!(
                "Resource {} (from pool {}) was not checked out from pool {}, adopting it as {}",
                id, pool_id, self.id, adopted
            );
            adopted
        };

        state.stats.returned += 1;

        if state.shut_down {
            debug!("Pool {} is shut down, expiring returned resource {}", self.id, id);
            self.expire_quietly(&mut state.stats, id, resource);
            return;
        }

        trace!("Resource {} returned to the idle registry", id);
        state.idle.push(id, resource, Instant::now());
    }

    /// Evict every idle resource older than the idle timeout.
    fn reap_idle(&self) -> usize {
        let mut state = self.state.lock();
        let expired = state
            .idle
            .take_expired(Instant::now(), self.config.idle_timeout);

        let count = expired.len();
        for entry in expired {
            debug!("Reaping resource {} idle since {:?}", entry.id, entry.idle_since);
            self.expire_quietly(&mut state.stats, entry.id, entry.resource);
        }
        state.stats.reaped += count;

        if count > 0 {
            debug!("Reaper evicted {} idle resources from pool {}", count, self.id);
        }
        count
    }

    /// Refuse further checkouts and expire everything idle.
    fn close(&self) -> usize {
        let mut state = self.state.lock();
        if state.shut_down {
            return 0;
        }
        state.shut_down = true;

        let idle = state.idle.take_all();
        let count = idle.len();
        for entry in idle {
            self.expire_quietly(&mut state.stats, entry.id, entry.resource);
        }
        count
    }

    fn expire_quietly(&self, stats: &mut PoolStats, id: ResourceId, resource: M::Resource) {
        stats.expired += 1;
        if let Err(e) = self.manager.expire(resource) {
            stats.expire_failures += 1;
            warn!("Failed to expire resource {}: {}", id, e);
        }
    }

    fn lease(self: &Arc<Self>, id: ResourceId, resource: M::Resource) -> Lease<M::Resource> {
        let pool: Weak<Self> = Arc::downgrade(self);
        let pool: Weak<dyn Reclaim<M::Resource>> = pool;
        Lease::new(id, self.id, resource, pool)
    }
}

impl<M: Manager> Reclaim<M::Resource> for Shared<M> {
    /// Forget an abandoned lease and expire its resource.
    fn reclaim(&self, id: ResourceId, pool_id: PoolId, resource: M::Resource) {
        let mut state = self.state.lock();
        if pool_id == self.id {
            state.in_use.remove(&id);
        }

        debug!("Lease {} dropped without being returned, expiring it", id);
        state.stats.abandoned += 1;
        self.expire_quietly(&mut state.stats, id, resource);
    }
}

/// A pool of reusable resources.
///
/// The pool grows on demand without bound and never blocks waiting for a
/// resource. Share one pool between callers with `Arc<Pool<M>>`.
pub struct Pool<M: Manager> {
    shared: Arc<Shared<M>>,

    /// Taken and stopped on shutdown
    reaper: Mutex<Option<Reaper>>,
}

impl<M: Manager> Pool<M> {
    /// Create a pool wired to `manager` and start its reaper.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, BuildError> {
        config.validate()?;

        let shared = Arc::new(Shared::new(manager, config));

        let target = Arc::downgrade(&shared);
        let reaper = Reaper::spawn(
            &shared.config.reaper_thread_name,
            shared.config.reap_interval,
            move || match target.upgrade() {
                Some(shared) => {
                    shared.reap_idle();
                    true
                }
                None => false,
            },
        )?;

        info!(
            "Created resource pool {} (idle timeout {:?}, reap interval {:?})",
            shared.id, shared.config.idle_timeout, shared.config.reap_interval
        );

        Ok(Self {
            shared,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Create a pool with the default configuration.
    pub fn with_default_config(manager: M) -> Result<Self, BuildError> {
        Self::new(manager, PoolConfig::default())
    }

    /// Check out a resource, reusing a valid idle one if there is any.
    ///
    /// Idle resources are tried most recently returned first. Each candidate
    /// is validated; those that fail are expired and the next is tried. When
    /// none is left a new resource is created. A creation failure is
    /// returned as [`PoolError::Create`].
    ///
    /// Pass the lease back with [`return_resource`](Self::return_resource);
    /// a lease that is simply dropped is expired instead of reused.
    #[must_use = "a dropped lease is expired rather than returned to the pool"]
    pub fn checkout(&self) -> Result<Lease<M::Resource>, PoolError<M::Error>> {
        self.shared.checkout()
    }

    /// Like [`checkout`](Self::checkout), but the resource is returned
    /// automatically when the guard is dropped.
    pub fn checkout_guard(&self) -> Result<LeaseGuard<M>, PoolError<M::Error>> {
        let lease = self.shared.checkout()?;
        Ok(LeaseGuard::new(lease, Arc::clone(&self.shared)))
    }

    /// Hand a resource back for reuse.
    ///
    /// Returning a lease this pool does not know about is tolerated: the
    /// resource is adopted into the idle registry under a fresh id. After
    /// shutdown the resource is expired instead.
    pub fn return_resource(&self, lease: Lease<M::Resource>) {
        self.shared.return_lease(lease);
    }

    /// Run one reaper sweep now, returning how many resources were evicted.
    pub fn reap_idle(&self) -> usize {
        self.shared.reap_idle()
    }

    /// Stop the reaper and expire every idle resource.
    ///
    /// Resources still checked out are expired when they are returned or
    /// their lease is dropped.
    /// Checkouts after shutdown fail with [`PoolError::ShutDown`].
    pub fn shutdown(&self) {
        if let Some(mut reaper) = self.reaper.lock().take() {
            reaper.stop();
        }

        let expired = self.shared.close();
        info!(
            "Resource pool {} shut down, expired {} idle resources",
            self.shared.id, expired
        );
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shut_down
    }

    /// Whether the background reaper thread is alive.
    pub fn is_reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .as_ref()
            .is_some_and(|reaper| reaper.is_running())
    }

    /// Get a snapshot of the pool's statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.in_use = state.in_use.len();
        stats.idle = state.idle.len();
        stats
    }

    /// Get the number of resources currently checked out.
    pub fn in_use_count(&self) -> usize {
        self.shared.state.lock().in_use.len()
    }

    /// Get the number of resources waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Ids of the resources currently checked out.
    pub fn in_use_ids(&self) -> Vec<ResourceId> {
        self.shared.state.lock().in_use.ids()
    }

    /// Ids of the idle resources, oldest first.
    pub fn idle_ids(&self) -> Vec<ResourceId> {
        self.shared.state.lock().idle.ids()
    }

    /// Whether `id` is currently checked out.
    pub fn is_in_use(&self, id: &ResourceId) -> bool {
        self.shared.state.lock().in_use.contains(id)
    }

    /// Whether `id` is currently idle.
    pub fn is_idle(&self, id: &ResourceId) -> bool {
        self.shared.state.lock().idle.contains(id)
    }

    /// This pool's id.
    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// The manager the pool was built with.
    pub fn manager(&self) -> &M {
        &self.shared.manager
    }
}

impl<M: Manager> Drop for Pool<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: Manager> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Pool")
            .field("id", &self.shared.id)
            .field("in_use", &state.in_use.len())
            .field("idle", &state.idle.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for TestError {}

    #[derive(Debug)]
    struct TestResource {
        serial: usize,
        valid: bool,
    }

    #[derive(Default)]
    struct TestManager {
        next_id: AtomicUsize,
        created: AtomicUsize,
        validated: AtomicUsize,
        expired: Mutex<Vec<usize>>,
        fail_create: AtomicBool,
        fail_expire: AtomicBool,
    }

    impl Manager for TestManager {
        type Resource = TestResource;
        type Error = TestError;

        fn create(&self) -> Result<TestResource, TestError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(TestError("create refused"));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            let serial = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TestResource {
                serial,
                valid: true,
            })
        }

        fn validate(&self, resource: &mut TestResource) -> bool {
            self.validated.fetch_add(1, Ordering::SeqCst);
            resource.valid
        }

        fn expire(&self, resource: TestResource) -> Result<(), TestError> {
            self.expired.lock().push(resource.serial);
            if self.fail_expire.load(Ordering::SeqCst) {
                return Err(TestError("close failed"));
            }
            Ok(())
        }
    }

    fn test_pool() -> Pool<TestManager> {
        let config = PoolConfig::default()
            .with_idle_timeout(Duration::from_millis(50))
            .with_reap_interval(Duration::from_secs(3600));
        Pool::new(TestManager::default(), config).unwrap()
    }

    #[test]
    fn test_checkout_creates_when_idle_empty() {
        let pool = test_pool();

        let lease = pool.checkout().unwrap();
        assert_eq!(lease.serial, 1);
        assert_eq!(pool.manager().created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.manager().validated.load(Ordering::SeqCst), 0);
        assert!(pool.is_in_use(&lease.id()));
        assert_eq!(lease.pool_id(), pool.id());
    }

    #[test]
    fn test_return_then_checkout_reuses() {
        let pool = test_pool();

        let lease = pool.checkout().unwrap();
        let id = lease.id();
        pool.return_resource(lease);
        assert!(pool.is_idle(&id));
        assert!(!pool.is_in_use(&id));

        let again = pool.checkout().unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(again.serial, 1);
        assert_eq!(pool.manager().created.load(Ordering::SeqCst), 1);

        let stats = pool.stats();
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_invalid_idle_resource_is_expired_and_replaced() {
        let pool = test_pool();

        let mut lease = pool.checkout().unwrap();
        lease.valid = false;
        pool.return_resource(lease);

        let fresh = pool.checkout().unwrap();
        assert_eq!(fresh.serial, 2);
        assert_eq!(*pool.manager().expired.lock(), vec![1]);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_most_recently_returned_is_preferred() {
        let pool = test_pool();

        let first = pool.checkout().unwrap();
        let second = pool.checkout().unwrap();
        pool.return_resource(first);
        pool.return_resource(second);

        assert_eq!(pool.checkout().unwrap().serial, 2);
    }

    #[test]
    fn test_create_failure_propagates() {
        let pool = test_pool();
        pool.manager().fail_create.store(true, Ordering::SeqCst);

        match pool.checkout() {
            Err(PoolError::Create(TestError(msg))) => assert_eq!(msg, "create refused"),
            other => panic!("expected creation failure, got {:?}", other),
        }
        assert_eq!(pool.in_use_count(), 0);

        // The pool itself is unaffected
        pool.manager().fail_create.store(false, Ordering::SeqCst);
        assert!(pool.checkout().is_ok());
    }

    #[test]
    fn test_expire_failure_is_swallowed() {
        let pool = test_pool();
        pool.manager().fail_expire.store(true, Ordering::SeqCst);

        let mut lease = pool.checkout().unwrap();
        lease.valid = false;
        pool.return_resource(lease);

        let fresh = pool.checkout().unwrap();
        assert_eq!(fresh.serial, 2);

        let stats = pool.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.expire_failures, 1);
    }

    #[test]
    fn test_reap_idle_evicts_only_expired() {
        let pool = test_pool();

        let old = pool.checkout().unwrap();
        let young = pool.checkout().unwrap();
        pool.return_resource(old);
        std::thread::sleep(Duration::from_millis(80));
        pool.return_resource(young);

        assert_eq!(pool.reap_idle(), 1);
        assert_eq!(*pool.manager().expired.lock(), vec![1]);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.stats().reaped, 1);
    }

    #[test]
    fn test_reap_continues_after_expire_failure() {
        let pool = test_pool();
        pool.manager().fail_expire.store(true, Ordering::SeqCst);

        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        pool.return_resource(a);
        pool.return_resource(b);
        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(pool.reap_idle(), 2);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().expire_failures, 2);
    }

    #[test]
    fn test_foreign_lease_is_adopted() {
        let pool = test_pool();
        let other = test_pool();

        let stray = other.checkout().unwrap();
        let stray_id = stray.id();
        pool.return_resource(stray);

        assert_eq!(pool.idle_count(), 1);
        assert!(!pool.is_idle(&stray_id));
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn test_shutdown_expires_idle_and_refuses_checkout() {
        let pool = test_pool();

        let idle = pool.checkout().unwrap();
        let held = pool.checkout().unwrap();
        pool.return_resource(idle);

        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(!pool.is_reaper_running());
        assert_eq!(*pool.manager().expired.lock(), vec![1]);
        assert!(matches!(pool.checkout(), Err(PoolError::ShutDown)));

        pool.return_resource(held);
        assert_eq!(*pool.manager().expired.lock(), vec![1, 2]);
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.idle_count(), 0);

        // Shutting down again does nothing
        pool.shutdown();
        assert_eq!(pool.stats().expired, 2);
    }

    #[test]
    fn test_dropped_lease_counts_as_abandoned() {
        let pool = test_pool();

        let kept = pool.checkout().unwrap();
        let dropped = pool.checkout().unwrap();
        drop(dropped);

        assert_eq!(pool.in_use_ids(), vec![kept.id()]);
        assert_eq!(*pool.manager().expired.lock(), vec![2]);

        let stats = pool.stats();
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.returned, 0);
    }

    #[test]
    fn test_guard_returns_on_drop() {
        let pool = test_pool();

        {
            let guard = pool.checkout_guard().unwrap();
            assert_eq!(guard.serial, 1);
            assert_eq!(pool.in_use_count(), 1);
        }

        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_guard_into_lease_keeps_resource_checked_out() {
        let pool = test_pool();

        let guard = pool.checkout_guard().unwrap();
        let lease = guard.into_lease();
        assert_eq!(pool.in_use_count(), 1);

        pool.return_resource(lease);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_last_checkout_recorded() {
        let pool = test_pool();
        assert!(pool.stats().last_checkout.is_none());

        let before = Instant::now();
        let _lease = pool.checkout().unwrap();
        assert!(pool.stats().last_checkout.unwrap() >= before);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PoolConfig::default().with_idle_timeout(Duration::ZERO);
        let result = Pool::new(TestManager::default(), config);
        assert!(matches!(result, Err(BuildError::Config(_))));
    }
}
