//! Effect scheduler.
//!
//! Writes never run effects inline. A write marks the dependency graph and
//! enqueues affected effects here; the queue is drained at the end of the
//! current unit of work: the outermost [`batch`] exit, or an explicit
//! [`flush_effects`] call for code that does not batch. This is the
//! cooperative, microtask-like boundary of the engine: all synchronous writes
//! in a unit complete first, then each affected effect runs once.
//!
//! The pending set is deduplicated, so many writes (or a diamond-shaped
//! dependency graph reaching the same effect along two paths) schedule a
//! single run per effect per flush.
//!
//! The queue is thread-local: effects are enqueued on the thread that
//! performed the write and run on the thread that flushes, which is the
//! single logical thread of control the engine assumes.

use indexmap::IndexSet;
use std::cell::{Cell, RefCell};

use super::runtime::Runtime;
use super::SubscriberId;

thread_local! {
    static PENDING: RefCell<IndexSet<SubscriberId>> = RefCell::new(IndexSet::new());
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static BATCH_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Queue an effect for the next flush.
///
/// Idempotent within a flush: an effect already pending is not queued twice.
pub(crate) fn enqueue(id: SubscriberId) {
    PENDING.with(|pending| {
        if pending.borrow_mut().insert(id) {
            tracing::trace!(
                target: "rill_core::scheduler",
                effect = id.as_u64(),
                "effect queued"
            );
        }
    });
}

/// Run every pending effect, then every effect those runs scheduled, until
/// the queue is empty.
///
/// Re-entrant calls (a flush triggered from inside a running effect) return
/// immediately; the outer drain loop picks up the new work, so one effect
/// never executes in the middle of another.
pub fn flush_effects() {
    if FLUSHING.with(|f| f.get()) {
        return;
    }

    FLUSHING.with(|f| f.set(true));
    let reset = FlushGuard;

    loop {
        let wave: IndexSet<SubscriberId> = PENDING.with(|pending| pending.take());
        if wave.is_empty() {
            break;
        }

        for id in wave {
            Runtime::run_subscriber(id);
        }
    }

    drop(reset);
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.with(|f| f.set(false));
    }
}

/// Run `f` as one unit of work, flushing effects once when the outermost
/// batch exits.
///
/// Writes inside the batch mark and enqueue as usual but no effect runs
/// until `f` returns; multiple writes to the same dependency chain collapse
/// into a single run per affected effect.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let _guard = BatchGuard;
    f()
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = BATCH_DEPTH.with(|depth| {
            let next = depth.get() - 1;
            depth.set(next);
            next == 0
        });

        // Flush even when unwinding out of the batch body: queued work from
        // writes that completed must still run exactly once.
        if outermost {
            flush_effects();
        }
    }
}

/// Number of effects currently queued on this thread.
pub fn pending_effects() -> usize {
    PENDING.with(|pending| pending.borrow().len())
}
