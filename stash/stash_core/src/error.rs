//! Error types for the Stash resource pool.
//!
//! Failures are split by where they surface:
//!
//! - [`PoolError`] is returned from checkout. Only a failing `create` (or a
//!   checkout against a pool that has been shut down) escapes to callers;
//!   failures while disposing of a resource are absorbed by the pool.
//! - [`ConfigError`] covers configuration values and files.
//! - [`BuildError`] covers pool construction.

use std::path::PathBuf;
use thiserror::Error;

/// Error returned when a resource cannot be checked out of a pool.
///
/// `E` is the error type of the pool's [`Manager`](crate::traits::Manager).
#[derive(Error, Debug)]
pub enum PoolError<E> {
    /// The manager failed to create a new resource. The manager's error is
    /// carried unmodified.
    #[error("failed to create resource: {0}")]
    Create(#[source] E),

    /// The pool has been shut down
    #[error("resource pool is shut down")]
    ShutDown,
}

impl<E> PoolError<E> {
    /// Get the manager's creation error, if this is one.
    pub fn creation_error(&self) -> Option<&E> {
        match self {
            Self::Create(e) => Some(e),
            Self::ShutDown => None,
        }
    }

    /// Consume the error, returning the manager's creation error if this is one.
    pub fn into_creation_error(self) -> Option<E> {
        match self {
            Self::Create(e) => Some(e),
            Self::ShutDown => None,
        }
    }
}

/// Errors related to pool configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is out of range or malformed
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,

        /// Why the value was rejected
        reason: String,
    },

    /// The configuration file could not be read
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path of the file
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for a pool configuration
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while constructing a pool.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The supplied configuration was rejected
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// The background reaper thread could not be started
    #[error("failed to spawn reaper thread: {0}")]
    ReaperSpawn(#[from] std::io::Error),
}
