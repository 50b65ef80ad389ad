//! The capability contract between a pool and the resources it manages.
//!
//! A pool knows nothing about what it pools. Everything resource-specific
//! (how to open a connection, how to tell whether it is still alive, how to
//! close it) is supplied by a [`Manager`]. Exactly one manager is wired into
//! each pool when it is constructed.

use std::error::Error as StdError;
use std::fmt;

/// Creates, validates and releases the resources of one pool.
///
/// # Examples
///
/// ```
/// use std::io;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use stash_core::traits::Manager;
///
/// struct Counter {
///     next: AtomicU64,
/// }
///
/// impl Manager for Counter {
///     type Resource = u64;
///     type Error = io::Error;
///
///     fn create(&self) -> Result<u64, io::Error> {
///         Ok(self.next.fetch_add(1, Ordering::Relaxed))
///     }
///
///     fn validate(&self, _resource: &mut u64) -> bool {
///         true
///     }
///
///     fn expire(&self, _resource: u64) -> Result<(), io::Error> {
///         Ok(())
///     }
/// }
///
/// let manager = Counter { next: AtomicU64::new(1) };
/// assert_eq!(manager.create().unwrap(), 1);
/// ```
pub trait Manager: Send + Sync + 'static {
    /// The pooled resource type.
    type Resource: Send + 'static;

    /// Error produced when creating or releasing a resource.
    type Error: StdError + Send + Sync + 'static;

    /// Construct a new, ready-to-use resource.
    ///
    /// Failures are handed back to whoever asked the pool for a resource;
    /// the pool does not retry.
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Decide whether an idle resource can be handed out again.
    ///
    /// Called only at the moment of reuse. Closed or broken resources should
    /// report `false` rather than panic.
    fn validate(&self, resource: &mut Self::Resource) -> bool;

    /// Release a resource that is leaving the pool.
    ///
    /// This is best-effort: the pool logs an error and moves on.
    fn expire(&self, resource: Self::Resource) -> Result<(), Self::Error>;
}

type CreateFn<R, E> = Box<dyn Fn() -> Result<R, E> + Send + Sync>;
type ValidateFn<R> = Box<dyn Fn(&mut R) -> bool + Send + Sync>;
type ExpireFn<R, E> = Box<dyn Fn(R) -> Result<(), E> + Send + Sync>;

/// A [`Manager`] assembled from three closures.
///
/// Handy for wiring a pool without declaring a type, and for fakes in tests.
///
/// ```
/// use std::convert::Infallible;
/// use stash_core::traits::{FnManager, Manager};
///
/// let manager = FnManager::new(
///     || Ok::<_, Infallible>(String::from("session")),
///     |session: &mut String| !session.is_empty(),
///     |_session| Ok(()),
/// );
///
/// let mut session = manager.create().unwrap();
/// assert!(manager.validate(&mut session));
/// ```
pub struct FnManager<R, E> {
    create: CreateFn<R, E>,
    validate: ValidateFn<R>,
    expire: ExpireFn<R, E>,
}

impl<R, E> FnManager<R, E> {
    /// Build a manager from `create`, `validate` and `expire` callbacks.
    pub fn new<C, V, X>(create: C, validate: V, expire: X) -> Self
    where
        C: Fn() -> Result<R, E> + Send + Sync + 'static,
        V: Fn(&mut R) -> bool + Send + Sync + 'static,
        X: Fn(R) -> Result<(), E> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            validate: Box::new(validate),
            expire: Box::new(expire),
        }
    }
}

impl<R, E> Manager for FnManager<R, E>
where
    R: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    type Resource = R;
    type Error = E;

    fn create(&self) -> Result<R, E> {
        (self.create)()
    }

    fn validate(&self, resource: &mut R) -> bool {
        (self.validate)(resource)
    }

    fn expire(&self, resource: R) -> Result<(), E> {
        (self.expire)(resource)
    }
}

impl<R, E> fmt::Debug for FnManager<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_fn_manager_delegates() {
        let expired = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&expired);

        let manager = FnManager::new(
            || Ok::<_, io::Error>(7u32),
            |value: &mut u32| *value % 2 == 1,
            move |value| {
                recorder.lock().unwrap().push(value);
                Ok(())
            },
        );

        let mut value = manager.create().unwrap();
        assert_eq!(value, 7);
        assert!(manager.validate(&mut value));

        value += 1;
        assert!(!manager.validate(&mut value));

        manager.expire(value).unwrap();
        assert_eq!(*expired.lock().unwrap(), vec![8]);
    }

    #[test]
    fn test_fn_manager_create_failure_passes_through() {
        let manager: FnManager<u32, io::Error> = FnManager::new(
            || Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            |_| true,
            |_| Ok(()),
        );

        let err = manager.create().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
