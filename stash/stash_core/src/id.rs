//! Strongly-typed identifiers for pools and pooled resources.
//!
//! A checked-out resource is owned by its caller, so the pool cannot key its
//! registries by the resource value itself. Instead every resource is tagged
//! with a [`ResourceId`] when it is created, and every pool carries a
//! [`PoolId`] so leases can be traced back to the pool that issued them.
//!
//! # Examples
//!
//! ```
//! use stash_core::id::{PoolId, ResourceId};
//! use std::str::FromStr;
//!
//! let pool_id = PoolId::new();
//! let resource_id = ResourceId::new();
//! assert_ne!(pool_id.to_string(), resource_id.to_string());
//!
//! let id_str = "550e8400-e29b-41d4-a716-446655440000";
//! let resource_id = ResourceId::from_str(id_str).unwrap();
//! assert_eq!(resource_id.to_string(), id_str);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe identifier based on UUID.
///
/// The phantom parameter `T` keeps identifiers for different entities from
/// being mixed up even though they share the same representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Create an identifier from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolMarker;
/// Identifier for a pool instance.
pub type PoolId = Id<PoolMarker>;

/// Marker type for pooled resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceMarker;
/// Identifier the pool assigns to each resource it tracks.
pub type ResourceId = Id<ResourceMarker>;
