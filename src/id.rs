//! Identities for measurements and aggregations.
//!
//! Every entity produced during a run gets a sequential [`EntityId`] from the run's
//! [`IdFactory`]. Ids are never reused, so an id allocated earlier always compares
//! smaller than one allocated later. Lineage checks rely on that ordering: a
//! measurement may only name parents with a smaller id, which rules out cycles
//! without walking the graph.
//!
//! Ids are small, `Copy`, ordered and hashable, so they work as weak, lookup-only
//! references in parent and component sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique numeric identifier for a measurement or aggregation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena-style allocator handing out strictly increasing ids.
///
/// Shared by reference (usually behind an `Arc` inside the
/// [`Context`](crate::context::Context)), safe to call from worker threads.
#[derive(Debug)]
pub struct IdFactory {
    next: AtomicU64,
}

impl IdFactory {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start allocating at `first`; useful when continuing a previous run's numbering.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> EntityId {
        EntityId::new(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> EntityId {
        EntityId::new(self.next.load(Ordering::SeqCst))
    }
}

impl Default for IdFactory {
    fn default() -> Self {
        Self::new()
    }
}
