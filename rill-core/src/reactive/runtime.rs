//! Reactive runtime.
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the dependency graph and drives dirty propagation
//! when a source changes.
//!
//! # How it works
//!
//! 1. When a computed or effect evaluates, sources it reads record an edge
//!    here (`add_dependency`).
//!
//! 2. When a source's value changes, `notify_source_changed`:
//!    a. marks every direct dependent as maybe-dirty,
//!    b. lets computeds push the marking on to *their* dependents (each
//!       computed is itself a source), so the whole downstream region is
//!       marked transitively,
//!    c. enqueues eager dependents (effects) with the scheduler.
//!
//!    Marking is push-based; recomputation stays pull-based. Computeds
//!    recompute on the next read, and effects run when the queue is flushed.
//!
//! # Thread safety
//!
//! The registry and dependency map are process-wide concurrent maps so that
//! sources can be shared across threads; the tracking context itself is
//! thread-local (see `context`).

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;

use super::context::TrackingContext;
use super::scheduler;
use super::{SourceId, SubscriberId};

/// A computation that participates in dirty propagation.
///
/// Implemented by the shared cores of computeds (lazy) and effects (eager).
pub trait Reactive: Send + Sync {
    /// The subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this computation as potentially stale.
    ///
    /// Computeds propagate the marking to their own dependents on the
    /// clean-to-dirty transition.
    fn mark_maybe_dirty(&self);

    /// Whether this computation is eager (effect) or lazy (computed).
    fn is_eager(&self) -> bool;

    /// Execute a queued run. Only meaningful for eager computations; lazy
    /// ones recompute on read instead.
    fn run_scheduled(&self);
}

/// Handle to a registered reactive computation.
///
/// Dropping this handle unregisters the computation from the runtime and
/// removes it from every source's dependent set.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Registry of live computations, held weakly so the runtime never keeps a
// dropped computed or effect alive.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();

// Dependency edges: source -> subscribers that read it last evaluation.
// Insertion order preserved so notification order is deterministic.
static DEPENDENTS: OnceLock<DashMap<SourceId, IndexSet<SubscriberId>>> = OnceLock::new();

fn registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn dependents() -> &'static DashMap<SourceId, IndexSet<SubscriberId>> {
    DEPENDENTS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// Returns a handle that unregisters it when dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a computation and scrub it from every dependent set.
    fn unregister(id: SubscriberId) {
        registry().remove(&id);

        for mut entry in dependents().iter_mut() {
            entry.value_mut().shift_remove(&id);
        }
    }

    /// Record that `subscriber` read `source` during its last evaluation.
    ///
    /// Called automatically when a source is read within a tracking context.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        dependents().entry(source).or_default().insert(subscriber);
    }

    /// Remove the recorded edges from each of `sources` to `subscriber`.
    ///
    /// Called before a computation re-evaluates, so stale edges from the
    /// previous run are discarded and conditional dependencies stay correct.
    pub fn remove_dependencies<'a>(
        subscriber: SubscriberId,
        sources: impl IntoIterator<Item = &'a SourceId>,
    ) {
        for source in sources {
            if let Some(mut entry) = dependents().get_mut(source) {
                entry.value_mut().shift_remove(&subscriber);
            }
        }
    }

    /// Drop all bookkeeping for a source that no longer exists.
    pub(crate) fn drop_source(source: SourceId) {
        dependents().remove(&source);
    }

    /// Notify all dependents that a source changed.
    ///
    /// This is the core of push-based dirty propagation. Dependents are
    /// marked maybe-dirty (computeds recurse through their own source id)
    /// and eager dependents are enqueued for the next flush.
    pub fn notify_source_changed(source: SourceId) {
        // Snapshot the dependent list and release the map before touching
        // any computation: marking a computed re-enters this function.
        let subscriber_ids: Vec<SubscriberId> = match dependents().get(&source) {
            Some(entry) => entry.value().iter().copied().collect(),
            None => return,
        };

        if subscriber_ids.is_empty() {
            return;
        }

        tracing::trace!(
            target: "rill_core::runtime",
            source = source.as_u64(),
            dependents = subscriber_ids.len(),
            "source changed"
        );

        let mut live: Vec<Arc<dyn Reactive>> = Vec::with_capacity(subscriber_ids.len());
        for sub_id in subscriber_ids {
            if let Some(weak) = registry().get(&sub_id) {
                if let Some(reactive) = weak.upgrade() {
                    live.push(reactive);
                }
            }
        }

        for reactive in live {
            reactive.mark_maybe_dirty();

            if reactive.is_eager() {
                scheduler::enqueue(reactive.subscriber_id());
            }
        }
    }

    /// Execute a queued run for the given subscriber, if it is still live.
    ///
    /// Called by the scheduler while draining the pending queue.
    pub(crate) fn run_subscriber(id: SubscriberId) {
        let reactive = registry().get(&id).and_then(|weak| weak.upgrade());
        if let Some(reactive) = reactive {
            reactive.run_scheduled();
        }
    }

    /// The number of subscribers currently recorded for a source.
    pub fn dependent_count(source: SourceId) -> usize {
        dependents().get(&source).map_or(0, |entry| entry.len())
    }
}

/// Reconciles a computation's recorded dependency set with what its
/// evaluation actually read, on every exit path.
///
/// Must be created inside the evaluation's [`TrackingContext`] and dropped
/// before that context exits. On normal completion, edges the evaluation no
/// longer reads are removed and the set is replaced with the fresh reads.
/// When the evaluation unwinds, the fresh reads are merged into the existing
/// set instead, so the computation keeps its edges and the next completed
/// evaluation can discard the whole lot.
pub(crate) struct DependencyGuard<'a> {
    subscriber: SubscriberId,
    dependencies: &'a RwLock<IndexSet<SourceId>>,
}

impl<'a> DependencyGuard<'a> {
    pub(crate) fn new(
        subscriber: SubscriberId,
        dependencies: &'a RwLock<IndexSet<SourceId>>,
    ) -> Self {
        Self {
            subscriber,
            dependencies,
        }
    }
}

impl Drop for DependencyGuard<'_> {
    fn drop(&mut self) {
        let reads = TrackingContext::current_reads();
        let mut deps = self.dependencies.write();

        if std::thread::panicking() {
            // Keep the previous edges and add the partial reads, so a later
            // completed evaluation can discard all of them.
            for source in reads {
                deps.insert(source);
            }
            return;
        }

        let stale: Vec<SourceId> = deps
            .iter()
            .copied()
            .filter(|source| !reads.contains(source))
            .collect();
        Runtime::remove_dependencies(self.subscriber, stale.iter());
        *deps = reads.into_iter().collect();
    }
}
