//! In-use and idle registries.
//!
//! Neither registry is synchronized on its own: both live inside the pool's
//! single mutex so that moving a resource from one to the other is one
//! indivisible step.

use stash_core::id::ResourceId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Resources currently held by callers, keyed by id, with checkout time.
#[derive(Debug, Default)]
pub(crate) struct InUseRegistry {
    entries: HashMap<ResourceId, Instant>,
}

impl InUseRegistry {
    /// Record that `id` was checked out at `at`.
    pub(crate) fn insert(&mut self, id: ResourceId, at: Instant) {
        let previous = self.entries.insert(id, at);
        debug_assert!(previous.is_none(), "resource {id} checked out twice");
    }

    /// Forget `id`, returning when it was checked out.
    pub(crate) fn remove(&mut self, id: &ResourceId) -> Option<Instant> {
        self.entries.remove(id)
    }

    pub(crate) fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ids(&self) -> Vec<ResourceId> {
        self.entries.keys().copied().collect()
    }
}

/// An idle resource and the moment it was returned.
#[derive(Debug)]
pub(crate) struct IdleEntry<R> {
    pub(crate) id: ResourceId,
    pub(crate) resource: R,
    pub(crate) idle_since: Instant,
}

impl<R> IdleEntry<R> {
    /// Whether this entry has been idle for strictly longer than `timeout`.
    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.idle_since) > timeout
    }
}

/// Resources available for reuse, in the order they were returned.
#[derive(Debug)]
pub(crate) struct IdleRegistry<R> {
    entries: VecDeque<IdleEntry<R>>,
}

impl<R> Default for IdleRegistry<R> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<R> IdleRegistry<R> {
    /// Park a resource, stamping it with `at`.
    pub(crate) fn push(&mut self, id: ResourceId, resource: R, at: Instant) {
        debug_assert!(!self.contains(&id), "resource {id} returned twice");
        self.entries.push_back(IdleEntry {
            id,
            resource,
            idle_since: at,
        });
    }

    /// Take the most recently returned resource.
    pub(crate) fn pop_most_recent(&mut self) -> Option<IdleEntry<R>> {
        self.entries.pop_back()
    }

    /// Remove and return every entry idle for longer than `timeout`.
    pub(crate) fn take_expired(&mut self, now: Instant, timeout: Duration) -> Vec<IdleEntry<R>> {
        let (expired, kept): (VecDeque<_>, VecDeque<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.is_expired(now, timeout));
        self.entries = kept;
        expired.into()
    }

    /// Remove and return everything.
    pub(crate) fn take_all(&mut self) -> Vec<IdleEntry<R>> {
        self.entries.drain(..).collect()
    }

    pub(crate) fn contains(&self, id: &ResourceId) -> bool {
        self.entries.iter().any(|entry| entry.id == *id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ids(&self) -> Vec<ResourceId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }
}
