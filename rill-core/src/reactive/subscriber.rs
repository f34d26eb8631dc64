//! Identifier types for the reactive graph.
//!
//! The dependency graph has two kinds of participants: *sources* (anything
//! that can be read: signals and computeds) and *subscribers* (anything that
//! reads: computeds and effects). A computed is both, so it carries one id
//! of each kind.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a readable reactive value.
///
/// Signals and computeds draw from the same counter, so a dependency edge
/// can point at either without the runtime caring which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id, for diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a computation that reads reactive values.
///
/// Each subscriber (computed or effect) gets a unique ID when created. The
/// ID is used to record dependency edges and to deduplicate scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id, for diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}
