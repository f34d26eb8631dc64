//! Stream-to-signal bridge.
//!
//! [`to_signal`] mirrors a stream's emissions into a signal, one direction
//! only: producers keep pushing through the stream, while consumers read the
//! bridged value through the signal API, with tracked reads and dirty
//! propagation included. This removes the need for a per-read
//! subscription on the consuming side (the role the async pipe plays in
//! template-driven UIs).

use crate::reactive::{ReadSignal, Signal, SourceId};
use crate::stream::{Observable, Subscription};

/// Convert a stream into a read-only signal.
///
/// The signal starts at `initial` and is overwritten by every subsequent
/// emission (a `BehaviorSubject` source replays its current value on
/// subscribe, so the bridge picks that up immediately). The write path stays
/// private to the bridge: callers get reads only.
///
/// Dropping the returned [`BridgedSignal`] releases the subscription; no
/// write occurs after that.
pub fn to_signal<S>(stream: &S, initial: S::Item) -> BridgedSignal<S::Item>
where
    S: Observable,
    S::Item: Clone + Send + Sync + PartialEq + 'static,
{
    let signal = Signal::new(initial);

    let writer = signal.clone();
    let subscription = stream.subscribe(move |value| writer.set(value));

    BridgedSignal {
        signal,
        subscription,
    }
}

/// A signal kept up to date by a stream subscription.
///
/// Read-only from the outside: the only writer is the bridge's own observer.
pub struct BridgedSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
    subscription: Subscription,
}

impl<T> BridgedSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The underlying source ID.
    pub fn id(&self) -> SourceId {
        self.signal.id()
    }

    /// Get the current value, registering a dependency when read inside a
    /// computed or effect.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// A detached read-only view, cloneable and independent of the bridge's
    /// lifetime (after the bridge drops, the view simply stops changing).
    pub fn read_only(&self) -> ReadSignal<T> {
        self.signal.read_only()
    }
}

impl<T> Drop for BridgedSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<T> std::fmt::Debug for BridgedSignal<T>
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedSignal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}
