//! Tracking context.
//!
//! The tracking context records which computation is currently evaluating.
//! This enables automatic dependency tracking: when a source is read, the
//! read is attributed to the computation on top of the context stack, without
//! the caller declaring dependencies explicitly.
//!
//! # Implementation
//!
//! A thread-local stack of entries, pushed when a computed or effect starts
//! evaluating and popped by an RAII guard when it finishes. The stack (rather
//! than a single slot) is what makes nesting correct: a computed read inside
//! an effect's evaluation attributes its own internal reads to itself, while
//! the effect's read of the computed is attributed to the effect.
//!
//! The guard restores the previous context on every exit path, including
//! unwinding out of a panicking computation.

use smallvec::SmallVec;
use std::cell::RefCell;

use super::{SourceId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the tracking context stack.
#[derive(Debug)]
struct ContextEntry {
    /// The subscriber whose evaluation is in progress.
    subscriber_id: SubscriberId,
    /// Sources read so far during this evaluation, in first-read order.
    reads: SmallVec<[SourceId; 4]>,
}

/// Guard that pops the context when dropped.
pub struct TrackingContext {
    subscriber_id: SubscriberId,
}

impl TrackingContext {
    /// Enter a new tracking context for the given subscriber.
    ///
    /// While this context is active, any source that is read registers the
    /// subscriber as a dependent. The context is exited when the returned
    /// guard is dropped.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                reads: SmallVec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active tracking context on this thread.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the subscriber currently being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a read of the given source.
    ///
    /// Called by sources when they are read. Outside any tracking context
    /// this is a no-op, so untracked reads have no side effect.
    pub fn track_read(source: SourceId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.reads.contains(&source) {
                    entry.reads.push(source);
                }
            }
        });
    }

    /// The sources read so far in the current (innermost) context.
    pub fn current_reads() -> SmallVec<[SourceId; 4]> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.reads.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackingContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Catch mismatched enter/exit pairs early in debug builds.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "TrackingContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
