#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Stash Pool
//!
//! A generic, thread-safe pool for reusing expensive-to-create resources
//! such as network connections.
//!
//! The pool keeps two registries per instance: resources checked out by
//! callers and resources idle and ready for reuse. Checkout validates an
//! idle resource before handing it out and creates a new one only when no
//! idle resource is usable. A background reaper thread, owned by the pool,
//! expires resources that stay idle past the configured timeout.
//!
//! Resource-specific behavior is supplied through the
//! [`Manager`](stash_core::Manager) capability contract from `stash_core`.
//!
//! ## Sharing a pool
//!
//! A pool is an ordinary value. Build one per resource type at startup and
//! share it, typically as `Arc<Pool<M>>`.

/// Resource pooling with idle reaping
pub mod pool;

pub use pool::{Lease, LeaseGuard, Pool, PoolStats};
pub use stash_core::{BuildError, ConfigError, FnManager, Manager, PoolConfig, PoolError};
