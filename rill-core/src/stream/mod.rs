//! Push-based observable streams.
//!
//! This module implements the stream side of the engine: multi-subscriber
//! subjects ([`Subject`], [`BehaviorSubject`]) and lazy derived streams
//! ([`Observable::map`]). Where the signal side pulls values through a
//! dependency graph, a stream pushes each emission to every subscriber
//! synchronously, in subscription order, before `next` returns.
//!
//! Observer panics propagate to the caller of `next`, unlike effects, whose
//! scheduled failures are isolated. Callers needing isolation wrap each
//! observer themselves.

mod operators;
mod subject;

pub use operators::Map;
pub use subject::{BehaviorSubject, Subject};

use parking_lot::Mutex;

/// A push-based source of values.
///
/// The one capability the bridge and the operators need: attach an observer,
/// get back a handle to detach it. Every stream shape (subjects, mapped
/// streams) implements this, so downstream code never inspects which variant
/// it holds.
pub trait Observable {
    /// The element type delivered to observers.
    type Item: Clone + Send + 'static;

    /// Add an observer to the notification set.
    ///
    /// The observer receives every subsequent emission, in subscription
    /// order relative to other observers, until the returned
    /// [`Subscription`] is released.
    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(Self::Item) + Send + 'static;

    /// Derive a stream that re-emits `f(v)` for every upstream emission.
    ///
    /// Lazy: building the mapped stream neither subscribes upstream nor
    /// invokes `f`. Work starts when the mapped stream itself is subscribed,
    /// once per downstream subscriber.
    fn map<U, F>(&self, f: F) -> Map<Self, F, U>
    where
        Self: Sized + Clone,
        U: Clone + Send + 'static,
        F: Fn(Self::Item) -> U + Send + Sync + 'static,
    {
        Map::new(self.clone(), f)
    }
}

/// Handle detaching an observer from the stream it was attached to.
///
/// Release is explicit: dropping the handle leaves the observer attached.
/// (The stream-to-signal bridge releases its subscription on teardown; see
/// `interop`.)
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Detach the observer. Idempotent: a second call is a no-op.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether `unsubscribe` has already run.
    pub fn is_closed(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
