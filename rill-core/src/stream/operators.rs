//! Derived-stream operators.
//!
//! Operators build lazily: a derived stream holds its source and transform
//! but subscribes to nothing until something subscribes to *it*. Each
//! downstream subscription turns into one upstream subscription with the
//! transform composed in front of the observer.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{Observable, Subscription};

/// Stream returned by [`Observable::map`]: re-emits `f(v)` for every
/// upstream emission.
pub struct Map<S, F, U> {
    source: S,
    f: Arc<F>,
    _out: PhantomData<fn() -> U>,
}

impl<S, F, U> Map<S, F, U>
where
    S: Observable,
    U: Clone + Send + 'static,
    F: Fn(S::Item) -> U + Send + Sync + 'static,
{
    pub(crate) fn new(source: S, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
            _out: PhantomData,
        }
    }
}

impl<S, F, U> Clone for Map<S, F, U>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            f: Arc::clone(&self.f),
            _out: PhantomData,
        }
    }
}

impl<S, F, U> Observable for Map<S, F, U>
where
    S: Observable,
    U: Clone + Send + 'static,
    F: Fn(S::Item) -> U + Send + Sync + 'static,
{
    type Item = U;

    fn subscribe<G>(&self, mut observer: G) -> Subscription
    where
        G: FnMut(U) + Send + 'static,
    {
        let f = Arc::clone(&self.f);
        self.source.subscribe(move |value| observer(f(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{BehaviorSubject, Subject};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn map_transforms_each_emission() {
        let subject = Subject::new();
        let doubled = subject.map(|v: i32| v * 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let _sub = doubled.subscribe(move |v| seen_in.lock().push(v));

        subject.next(1);
        subject.next(4);

        assert_eq!(seen.lock().as_slice(), &[2, 8]);
    }

    #[test]
    fn map_is_lazy_until_subscribed() {
        let subject = Subject::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_in = calls.clone();
        let mapped = subject.map(move |v: i32| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            v * 2
        });

        // No subscriber: emissions must not reach the transform.
        subject.next(1);
        subject.next(2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(subject.observer_count(), 0);

        let _sub = mapped.subscribe(|_| {});
        subject.next(3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn map_over_behavior_subject_transforms_the_replay() {
        let subject = BehaviorSubject::new(3);
        let doubled = subject.map(|v: i32| v * 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let _sub = doubled.subscribe(move |v| seen_in.lock().push(v));

        // Replayed seed arrives mapped, then live emissions follow.
        subject.next(5);
        assert_eq!(seen.lock().as_slice(), &[6, 10]);
    }

    #[test]
    fn map_chains_compose() {
        let subject = Subject::new();
        let plus_one_doubled = subject.map(|v: i32| v + 1).map(|v| v * 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let _sub = plus_one_doubled.subscribe(move |v| seen_in.lock().push(v));

        subject.next(3);
        assert_eq!(seen.lock().as_slice(), &[8]);
    }

    #[test]
    fn unsubscribing_mapped_stream_detaches_upstream() {
        let subject = Subject::new();
        let mapped = subject.map(|v: i32| v);

        let sub = mapped.subscribe(|_| {});
        assert_eq!(subject.observer_count(), 1);

        sub.unsubscribe();
        assert_eq!(subject.observer_count(), 0);
    }
}
