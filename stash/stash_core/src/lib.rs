#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Stash Core
//!
//! `stash_core` holds the pieces shared by every Stash pool: the capability
//! contract a resource type implements, the identifiers the pool uses to
//! track resources, the error types, and pool configuration.
//!
//! ## Crate Structure
//!
//! - **error**: Checkout, configuration and construction errors
//! - **id**: Strongly-typed identifiers for pools and resources
//! - **traits**: The `Manager` capability contract (create / validate / expire)
//! - **utils**: Configuration loading and validation

pub mod error;
pub mod id;
pub mod traits;
pub mod utils;

pub use error::{BuildError, ConfigError, PoolError};
pub use id::{PoolId, ResourceId};
pub use traits::{FnManager, Manager};
pub use utils::PoolConfig;
