//! Signal implementation.
//!
//! A Signal is the fundamental writable reactive primitive: a single value
//! cell that tracks which computations depend on it.
//!
//! # How signals work
//!
//! 1. When a signal is read inside a tracking context (computed or effect),
//!    the signal registers that context as a dependent.
//!
//! 2. When the value changes, dependents are marked dirty transitively and
//!    dependent effects are queued. Nothing recomputes or runs inline with
//!    the write (see `runtime` and `scheduler`).
//!
//! 3. A write whose new value compares equal to the current one stores the
//!    value but notifies nobody: no marking, no queuing. This equality
//!    cut-off is what keeps untouched branches of the graph from
//!    recomputing.
//!
//! # Thread safety
//!
//! The value sits behind a `parking_lot::RwLock`; dependency bookkeeping
//! lives in the global runtime.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::TrackingContext;
use super::runtime::Runtime;
use super::SourceId;

/// Equality used for the write cut-off.
type EqualityFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct SignalCore<T> {
    id: SourceId,
    value: RwLock<T>,
    equals: EqualityFn<T>,
}

impl<T> Drop for SignalCore<T> {
    fn drop(&mut self) {
        Runtime::drop_source(self.id);
    }
}

/// A reactive signal holding a value of type `T`.
///
/// Cloning a `Signal` yields another handle to the same cell; all clones
/// share the value and the dependent set.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let value = count.get();
///
/// // Notifies dependents (unless the value is unchanged)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<SignalCore<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new signal with the given initial value, using `==` for the
    /// write cut-off.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, |a, b| a == b)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a signal with a custom equality predicate.
    ///
    /// Useful for types without a meaningful `PartialEq`, or when only part
    /// of the value should participate in the cut-off.
    pub fn with_equality(value: T, equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            core: Arc::new(SignalCore {
                id: SourceId::new(),
                value: RwLock::new(value),
                equals: Arc::new(equals),
            }),
        }
    }

    /// The signal's unique source ID.
    pub fn id(&self) -> SourceId {
        self.core.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking context, registers the current
    /// computation as a dependent of this signal. Outside any context this
    /// is a plain read with no side effect.
    pub fn get(&self) -> T {
        if TrackingContext::is_active() {
            TrackingContext::track_read(self.core.id);

            if let Some(subscriber) = TrackingContext::current_subscriber() {
                Runtime::add_dependency(self.core.id, subscriber);
            }
        }

        self.core.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.core.value.read().clone()
    }

    /// Set a new value.
    ///
    /// The value is replaced unconditionally. Dependents are only notified
    /// (transitively dependent computeds marked dirty, dependent effects
    /// queued) when the new value compares unequal to the old one.
    pub fn set(&self, value: T) {
        let changed = {
            let mut guard = self.core.value.write();
            let changed = !(self.core.equals)(&guard, &value);
            *guard = value;
            changed
        };

        if changed {
            Runtime::notify_source_changed(self.core.id);
        }
    }

    /// Update the value using a function of the current value.
    ///
    /// The read and write are one atomic step: the write lock is held across
    /// `f`, so no other mutation can interleave.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let changed = {
            let mut guard = self.core.value.write();
            let next = f(&guard);
            let changed = !(self.core.equals)(&guard, &next);
            *guard = next;
            changed
        };

        if changed {
            Runtime::notify_source_changed(self.core.id);
        }
    }

    /// A read-only view of this signal.
    ///
    /// The view shares the cell: it sees every write made through any
    /// writable handle, but exposes no way to write itself.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            inner: self.clone(),
        }
    }

    /// The number of computations currently depending on this signal.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.core.id)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.core.id)
            .field("value", &self.get_untracked())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// Read-only view of a [`Signal`].
///
/// Hands readers live access to the value without the ability to write it.
/// This is the encapsulation boundary between a state owner and its
/// consumers.
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The underlying source ID.
    pub fn id(&self) -> SourceId {
        self.inner.id()
    }

    /// Get the current value, registering a dependency when tracked.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.inner.core.id)
            .field("value", &self.get_untracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
    }

    #[test]
    fn read_only_view_tracks_writes() {
        let signal = Signal::new(1);
        let view = signal.read_only();

        assert_eq!(view.get(), 1);
        signal.set(9);
        assert_eq!(view.get(), 9);
    }

    #[test]
    fn custom_equality_controls_cut_off() {
        // Compare only the first element: writes differing in the second
        // field are treated as equal and must not notify.
        let signal = Signal::with_equality((1, "a"), |a, b| a.0 == b.0);

        // Equal by the configured predicate: stored, but no notification.
        signal.set((1, "b"));
        assert_eq!(signal.get(), (1, "b"));

        signal.set((2, "b"));
        assert_eq!(signal.get(), (2, "b"));
    }

    #[test]
    fn untracked_read_registers_no_dependency() {
        let signal = Signal::new(0);
        let _ = signal.get();
        let _ = signal.get_untracked();
        assert_eq!(signal.dependent_count(), 0);
    }
}
