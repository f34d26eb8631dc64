//! Computed signal implementation.
//!
//! A Computed is a derived, memoized value that re-evaluates only when a
//! dependency changed.
//!
//! # How computeds work
//!
//! 1. On first read, the defining function runs inside a tracking context
//!    and the result is cached.
//!
//! 2. When a dependency changes, the computed is marked dirty. Being itself
//!    a source, it pushes the marking on to its own dependents. No value is
//!    recomputed at write time.
//!
//! 3. On the next read, a dirty computed re-evaluates. The dependency set is
//!    recorded fresh from that evaluation, so a branch the function no
//!    longer reads stops triggering it (conditional dependencies).
//!
//! Dirty marking is push-based, recomputation is pull-based: branches of the
//! graph nobody reads are never recomputed.
//!
//! # Cycles
//!
//! A computed whose evaluation re-enters itself (A reads B, B reads A) is a
//! programming error. It is detected with a per-computed "currently
//! evaluating" marker and reported as [`CycleError`] instead of recursing
//! unboundedly: [`Computed::try_get`] returns it, [`Computed::get`] panics
//! with it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::context::TrackingContext;
use super::runtime::{DependencyGuard, Reactive, ReactiveHandle, Runtime};
use super::{SourceId, SubscriberId};
use crate::error::CycleError;

/// Dirtiness of a computed's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency may have changed since the cache was filled.
    MaybeDirty,

    /// The cache is definitely stale (or was never filled).
    Dirty,
}

struct ComputedCore<T> {
    id: SourceId,
    subscriber_id: SubscriberId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: RwLock<ComputedState>,
    /// Set while the defining function is running; re-entry means a cycle.
    evaluating: AtomicBool,
    /// Sources read during the last evaluation.
    dependencies: RwLock<IndexSet<SourceId>>,
}

impl<T> Drop for ComputedCore<T> {
    fn drop(&mut self) {
        Runtime::drop_source(self.id);
    }
}

impl<T> Reactive for ComputedCore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        let propagate = {
            let mut state = self.state.write();
            if *state == ComputedState::Clean {
                *state = ComputedState::MaybeDirty;
                true
            } else {
                false
            }
        };

        // A computed is a source too: push the marking downstream, but only
        // on the clean-to-dirty transition so propagation terminates.
        if propagate {
            Runtime::notify_source_changed(self.id);
        }
    }

    fn is_eager(&self) -> bool {
        false
    }

    fn run_scheduled(&self) {
        // Lazy: recomputation happens on the next read, never here.
    }
}

/// A memoized derived value that recomputes only when dependencies change.
///
/// Cloning a `Computed` yields another handle to the same cache.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
/// let count_for_double = count.clone();
/// let double = Computed::new(move || count_for_double.get() * 2);
///
/// assert_eq!(double.get(), 4);
/// count.set(5);
/// assert_eq!(double.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<ComputedCore<T>>,
    // Keeps the core registered with the runtime; dropped with the last
    // handle, which unregisters and scrubs dependency edges.
    _handle: Arc<ReactiveHandle>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed with the given defining function.
    ///
    /// The function is not run immediately; it runs on first read.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let core = Arc::new(ComputedCore {
            id: SourceId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(ComputedState::Dirty),
            evaluating: AtomicBool::new(false),
            dependencies: RwLock::new(IndexSet::new()),
        });

        let handle = Runtime::register(core.clone() as Arc<dyn Reactive>);

        Self {
            core,
            _handle: Arc::new(handle),
        }
    }

    /// The computed's unique source ID.
    pub fn id(&self) -> SourceId {
        self.core.id
    }

    /// Get the current value, recomputing if a dependency changed.
    ///
    /// # Panics
    ///
    /// Panics with a [`CycleError`] message if evaluation re-enters this
    /// computed. Use [`try_get`](Self::try_get) to handle that case as a
    /// value.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if a dependency changed.
    ///
    /// Returns [`CycleError`] when this computed's evaluation re-enters
    /// itself before completing.
    pub fn try_get(&self) -> Result<T, CycleError> {
        // A computed read inside another computation makes this computed a
        // dependency of that computation.
        if TrackingContext::is_active() {
            TrackingContext::track_read(self.core.id);

            if let Some(subscriber) = TrackingContext::current_subscriber() {
                Runtime::add_dependency(self.core.id, subscriber);
            }
        }

        let state = *self.core.state.read();
        match state {
            ComputedState::Clean => {
                let cached = self.core.value.read().clone();
                match cached {
                    Some(value) => Ok(value),
                    // Unreachable in practice: Clean implies a filled cache.
                    None => self.recompute(),
                }
            }
            ComputedState::MaybeDirty | ComputedState::Dirty => self.recompute(),
        }
    }

    /// Re-evaluate the defining function and refresh the cache.
    ///
    /// An evaluation that unwinds keeps the previous dependency set (plus
    /// whatever it read before failing), so the next completed evaluation can
    /// discard every stale edge.
    fn recompute(&self) -> Result<T, CycleError> {
        if self.core.evaluating.swap(true, Ordering::SeqCst) {
            return Err(CycleError {
                computed: self.core.id,
            });
        }
        let _eval_guard = EvalGuard(&self.core.evaluating);

        let new_value;
        {
            let _ctx = TrackingContext::enter(self.core.subscriber_id);
            let _deps = DependencyGuard::new(self.core.subscriber_id, &self.core.dependencies);
            new_value = (self.core.compute)();
        }

        *self.core.value.write() = Some(new_value.clone());
        *self.core.state.write() = ComputedState::Clean;

        Ok(new_value)
    }

    /// Get the current value without registering this read as a dependency
    /// of the surrounding computation. Still recomputes when dirty.
    pub fn get_untracked(&self) -> Result<T, CycleError> {
        let state = *self.core.state.read();
        match state {
            ComputedState::Clean => {
                let cached = self.core.value.read().clone();
                match cached {
                    Some(value) => Ok(value),
                    None => self.recompute(),
                }
            }
            _ => self.recompute(),
        }
    }

    /// The current dirtiness of the cache.
    pub fn state(&self) -> ComputedState {
        *self.core.state.read()
    }

    /// Whether the cache has ever been filled.
    pub fn has_value(&self) -> bool {
        self.core.value.read().is_some()
    }

    /// The number of sources the last evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.core.dependencies.read().len()
    }

    /// The number of computations currently depending on this computed.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.core.id)
    }
}

/// Clears the evaluating marker on every exit path, unwinding included.
struct EvalGuard<'a>(&'a AtomicBool);

impl Drop for EvalGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.core.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
