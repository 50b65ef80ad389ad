//! Handles given to callers for checked-out resources.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use stash_core::id::{PoolId, ResourceId};
use stash_core::traits::Manager;

use super::resource::Shared;

/// Takes back the resource of a lease that was dropped without being returned.
pub(crate) trait Reclaim<R>: Send + Sync {
    fn reclaim(&self, id: ResourceId, pool_id: PoolId, resource: R);
}

/// A checked-out resource.
///
/// The lease owns the resource exclusively until it is handed back with
/// [`Pool::return_resource`](super::Pool::return_resource). It is not
/// `Clone`, so no two callers can ever hold the same resource.
///
/// Dropping a lease without returning it is not a leak: the issuing pool
/// forgets the resource and expires it.
#[must_use = "a dropped lease is expired rather than returned to the pool"]
pub struct Lease<R> {
    pub(crate) id: ResourceId,
    pub(crate) pool_id: PoolId,

    /// `None` only once the resource has been handed back
    resource: Option<R>,

    pool: Weak<dyn Reclaim<R>>,
}

impl<R> Lease<R> {
    pub(crate) fn new(
        id: ResourceId,
        pool_id: PoolId,
        resource: R,
        pool: Weak<dyn Reclaim<R>>,
    ) -> Self {
        Self {
            id,
            pool_id,
            resource: Some(resource),
            pool,
        }
    }

    /// The id the issuing pool tracks this resource under.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The pool that issued this lease.
    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    /// Take the resource out, disarming the drop hook.
    pub(crate) fn take_resource(mut self) -> R {
        self.resource.take().expect("Resource missing")
    }
}

impl<R> Deref for Lease<R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.resource.as_ref().expect("Resource missing")
    }
}

impl<R> DerefMut for Lease<R> {
    fn deref_mut(&mut self) -> &mut R {
        self.resource.as_mut().expect("Resource missing")
    }
}

impl<R> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            // With the pool gone its manager is gone too; plain drop is all that is left.
            if let Some(pool) = self.pool.upgrade() {
                pool.reclaim(self.id, self.pool_id, resource);
            }
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .field("resource", &self.resource)
            .finish()
    }
}

/// A lease that returns itself to its pool when dropped.
///
/// If the pool has been shut down in the meantime the resource is expired
/// instead.
pub struct LeaseGuard<M: Manager> {
    lease: Option<Lease<M::Resource>>,
    shared: Arc<Shared<M>>,
}

impl<M: Manager> LeaseGuard<M> {
    pub(crate) fn new(lease: Lease<M::Resource>, shared: Arc<Shared<M>>) -> Self {
        Self {
            lease: Some(lease),
            shared,
        }
    }

    /// The id the pool tracks this resource under.
    pub fn id(&self) -> ResourceId {
        self.lease().id
    }

    /// Hand the resource back to the pool now.
    pub fn return_to_pool(mut self) {
        if let Some(lease) = self.lease.take() {
            self.shared.return_lease(lease);
        }
    }

    /// Stop managing the return automatically.
    ///
    /// The caller becomes responsible for passing the lease to
    /// [`Pool::return_resource`](super::Pool::return_resource).
    pub fn into_lease(mut self) -> Lease<M::Resource> {
        self.lease.take().expect("lease already returned")
    }

    fn lease(&self) -> &Lease<M::Resource> {
        self.lease.as_ref().expect("lease already returned")
    }
}

impl<M: Manager> Deref for LeaseGuard<M> {
    type Target = M::Resource;

    fn deref(&self) -> &M::Resource {
        self.lease()
    }
}

impl<M: Manager> DerefMut for LeaseGuard<M> {
    fn deref_mut(&mut self) -> &mut M::Resource {
        self.lease.as_mut().expect("lease already returned")
    }
}

impl<M: Manager> Drop for LeaseGuard<M> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.shared.return_lease(lease);
        }
    }
}

impl<M: Manager> fmt::Debug for LeaseGuard<M>
where
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lease {
            Some(lease) => write!(f, "LeaseGuard({:?})", lease),
            None => write!(f, "LeaseGuard(returned)"),
        }
    }
}
