//! Resource pooling and efficient reuse of expensive resources.
//!
//! - `resource`: the pool itself (checkout, return, shutdown, statistics)
//! - `lease`: handles for checked-out resources
//! - `registry`: the in-use and idle registries behind the pool lock
//! - `reaper`: the background thread evicting idle resources

pub mod lease;
mod reaper;
mod registry;
pub mod resource;

pub use lease::{Lease, LeaseGuard};
pub use resource::{Pool, PoolStats};
