//! Subjects: the producer ends of the stream side.
//!
//! A [`Subject`] is a plain multi-subscriber stream; a [`BehaviorSubject`]
//! additionally retains the latest emission and replays it to anyone who
//! subscribes late.
//!
//! # Delivery semantics
//!
//! `next` delivers synchronously to a snapshot of the observers that were
//! subscribed when the emission began, in subscription order:
//!
//! - an observer subscribing during delivery is not notified of the
//!   in-progress emission;
//! - an observer unsubscribing during delivery does not receive it if the
//!   removal lands before its turn;
//! - a `next` issued from inside an observer callback is queued and
//!   delivered after the current emission completes, so deliveries never
//!   interleave.
//!
//! Observer panics propagate to the `next` caller; pending queued emissions
//! are discarded so the subject stays usable afterwards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{Observable, Subscription};

type Callback<T> = Box<dyn FnMut(T) + Send>;

struct ObserverSlot<T> {
    id: u64,
    callback: Arc<Mutex<Callback<T>>>,
}

impl<T> Clone for ObserverSlot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

struct SubjectCore<T> {
    /// Insertion order is notification order.
    observers: Mutex<Vec<ObserverSlot<T>>>,
    /// Emissions issued while a delivery is in progress wait here.
    queue: Mutex<VecDeque<T>>,
    delivering: AtomicBool,
    next_slot_id: AtomicU64,
}

impl<T> SubjectCore<T>
where
    T: Clone + Send + 'static,
{
    fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
            next_slot_id: AtomicU64::new(0),
        }
    }

    fn attach(&self, observer: impl FnMut(T) + Send + 'static) -> u64 {
        let id = self.next_slot_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push(ObserverSlot {
            id,
            callback: Arc::new(Mutex::new(Box::new(observer))),
        });
        id
    }

    fn detach(&self, id: u64) {
        self.observers.lock().retain(|slot| slot.id != id);
    }

    fn is_attached(&self, id: u64) -> bool {
        self.observers.lock().iter().any(|slot| slot.id == id)
    }

    fn next(&self, value: T) {
        self.queue.lock().push_back(value);

        // Re-entrant emission from inside an observer: leave it queued, the
        // delivery loop below picks it up after the current round completes.
        if self.delivering.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = DeliveryGuard { core: self };

        loop {
            let value = match self.queue.lock().pop_front() {
                Some(value) => value,
                None => break,
            };

            // Snapshot: late subscribers miss this emission.
            let snapshot: Vec<ObserverSlot<T>> = self.observers.lock().clone();
            for slot in snapshot {
                // Honor removals that happened earlier in this delivery.
                if !self.is_attached(slot.id) {
                    continue;
                }
                let mut callback = slot.callback.lock();
                (*callback)(value.clone());
            }
        }
    }
}

/// Resets the delivery flag on every exit path. When unwinding out of an
/// observer panic, queued emissions are dropped rather than delivered at
/// some arbitrary later point.
struct DeliveryGuard<'a, T> {
    core: &'a SubjectCore<T>,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.core.queue.lock().clear();
        }
        self.core.delivering.store(false, Ordering::SeqCst);
    }
}

/// A multi-subscriber push stream.
///
/// Cloning yields another handle to the same stream: emissions through any
/// clone reach every subscriber.
pub struct Subject<T>
where
    T: Clone + Send + 'static,
{
    core: Arc<SubjectCore<T>>,
}

impl<T> Subject<T>
where
    T: Clone + Send + 'static,
{
    /// Create a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            core: Arc::new(SubjectCore::new()),
        }
    }

    /// Emit a value to every currently subscribed observer.
    ///
    /// Delivery is synchronous and complete before `next` returns (unless
    /// called from inside an observer, in which case the emission is queued
    /// behind the one being delivered).
    pub fn next(&self, value: T) {
        self.core.next(value);
    }

    /// The number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.core.observers.lock().len()
    }

    fn attach(&self, observer: impl FnMut(T) + Send + 'static) -> Subscription {
        let id = self.core.attach(observer);
        let weak = Arc::downgrade(&self.core);
        Subscription::new(move || {
            if let Some(core) = weak.upgrade() {
                core.detach(id);
            }
        })
    }
}

impl<T> Default for Subject<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T>
where
    T: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Observable for Subject<T>
where
    T: Clone + Send + 'static,
{
    type Item = T;

    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        self.attach(observer)
    }
}

/// A [`Subject`] that retains its latest value.
///
/// New subscribers are invoked immediately with the current value; `next`
/// stores the value before delivering it, so `value()` is already up to date
/// inside observer callbacks.
pub struct BehaviorSubject<T>
where
    T: Clone + Send + 'static,
{
    subject: Subject<T>,
    latest: Arc<RwLock<T>>,
}

impl<T> BehaviorSubject<T>
where
    T: Clone + Send + 'static,
{
    /// Create a behavior subject seeded with `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            subject: Subject::new(),
            latest: Arc::new(RwLock::new(initial)),
        }
    }

    /// The latest emitted value (or the seed, before any emission).
    pub fn value(&self) -> T {
        self.latest.read().clone()
    }

    /// Store `value` as the latest value, then emit it.
    pub fn next(&self, value: T) {
        *self.latest.write() = value.clone();
        self.subject.next(value);
    }

    /// The number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }
}

impl<T> Clone for BehaviorSubject<T>
where
    T: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<T> Observable for BehaviorSubject<T>
where
    T: Clone + Send + 'static,
{
    type Item = T;

    fn subscribe<F>(&self, mut observer: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let current = self.latest.read().clone();
        observer(current);
        self.subject.attach(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subject_delivers_to_all_subscribers_in_order() {
        let subject = Subject::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log1 = log.clone();
        let _s1 = subject.subscribe(move |v: i32| log1.lock().push(("first", v)));
        let log2 = log.clone();
        let _s2 = subject.subscribe(move |v: i32| log2.lock().push(("second", v)));

        subject.next(7);

        assert_eq!(log.lock().as_slice(), &[("first", 7), ("second", 7)]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let subject = Subject::new();
        let count = Arc::new(AtomicI32::new(0));

        let count_in = count.clone();
        let sub = subject.subscribe(move |_: i32| {
            count_in.fetch_add(1, Ordering::SeqCst);
        });

        subject.next(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(sub.is_closed());

        subject.next(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn behavior_subject_replays_latest_to_late_subscriber() {
        let subject = BehaviorSubject::new(0);
        let first = Arc::new(Mutex::new(Vec::new()));

        let first_in = first.clone();
        let _s1 = subject.subscribe(move |v: i32| first_in.lock().push(v));

        subject.next(5);
        assert_eq!(first.lock().as_slice(), &[0, 5]);

        // Late subscriber: gets 5 immediately, without another next().
        let second = Arc::new(Mutex::new(Vec::new()));
        let second_in = second.clone();
        let _s2 = subject.subscribe(move |v: i32| second_in.lock().push(v));
        assert_eq!(second.lock().as_slice(), &[5]);
    }

    #[test]
    fn behavior_subject_value_is_current_inside_callbacks() {
        let subject = BehaviorSubject::new(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let subject_in = subject.clone();
        let seen_in = seen.clone();
        let _s = subject.subscribe(move |_v| {
            seen_in.store(subject_in.value(), Ordering::SeqCst);
        });

        subject.next(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn subscriber_joining_during_delivery_misses_that_emission() {
        let subject = Subject::new();
        let joined = Arc::new(Mutex::new(Vec::new()));

        let subject_in = subject.clone();
        let joined_in = joined.clone();
        let _s1 = subject.subscribe(move |v: i32| {
            if v == 1 {
                let joined_inner = joined_in.clone();
                // Leak the inner subscription handle: detaching is not the
                // point of this test.
                let sub = subject_in.subscribe(move |v| joined_inner.lock().push(v));
                std::mem::forget(sub);
            }
        });

        subject.next(1);
        assert!(joined.lock().is_empty());

        subject.next(2);
        assert_eq!(joined.lock().as_slice(), &[2]);
    }

    #[test]
    fn observer_removed_during_delivery_before_its_turn_is_skipped() {
        let subject = Subject::new();
        let second_log = Arc::new(Mutex::new(Vec::new()));

        // The first observer detaches the second one mid-delivery.
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in = slot.clone();
        let _s1 = subject.subscribe(move |_: i32| {
            if let Some(sub) = slot_in.lock().take() {
                sub.unsubscribe();
            }
        });

        let second_in = second_log.clone();
        let s2 = subject.subscribe(move |v: i32| second_in.lock().push(v));
        *slot.lock() = Some(s2);

        subject.next(1);

        // Removed before its turn: the second observer never sees the value.
        assert!(second_log.lock().is_empty());
        assert_eq!(subject.observer_count(), 1);
    }

    #[test]
    fn emission_from_inside_observer_is_ordered_after_current_delivery() {
        let subject = Subject::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let subject_in = subject.clone();
        let log1 = log.clone();
        let _s1 = subject.subscribe(move |v: i32| {
            log1.lock().push(("first", v));
            if v == 1 {
                subject_in.next(2);
            }
        });

        let log2 = log.clone();
        let _s2 = subject.subscribe(move |v: i32| log2.lock().push(("second", v)));

        subject.next(1);

        // Both observers see 1 before either sees the re-entrant 2.
        assert_eq!(
            log.lock().as_slice(),
            &[("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn observer_panic_propagates_to_next_caller() {
        let subject = Subject::new();
        let _s = subject.subscribe(|v: i32| {
            if v == 13 {
                panic!("unlucky");
            }
        });

        let subject_in = subject.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            subject_in.next(13);
        }));
        assert!(result.is_err());

        // Subject stays usable after the panic.
        subject.next(1);
    }
}
