//! Effect implementation.
//!
//! An Effect is a side-effecting computation that re-runs whenever a source
//! it read changes.
//!
//! # How effects work
//!
//! 1. On creation the effect runs once, synchronously, to perform its first
//!    side effect and seed the dependency set. A panic in this first run
//!    propagates to the creator.
//!
//! 2. A write to any dependency queues the effect with the scheduler. The
//!    run happens when the current unit of work flushes, never inline with
//!    the write and never in the middle of another effect's run. Several
//!    writes in one unit queue one run, not one per write.
//!
//! 3. Before each run the old dependency set is discarded and rebuilt from
//!    what the run actually reads.
//!
//! # Failure isolation
//!
//! A panic during a *scheduled* run is caught and handed to a process-wide
//! hook (see [`set_effect_error_hook`]); it never reaches the write that
//! triggered the run, and the effect stays active for subsequent triggers.
//! The default hook reports through `tracing::error!`.

use std::any::Any;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::context::TrackingContext;
use super::runtime::{DependencyGuard, Reactive, ReactiveHandle, Runtime};
use super::{SourceId, SubscriberId};
use crate::error::EffectError;

type ErrorHook = Box<dyn Fn(&EffectError) + Send + Sync>;

static ERROR_HOOK: OnceLock<RwLock<Option<ErrorHook>>> = OnceLock::new();

fn error_hook() -> &'static RwLock<Option<ErrorHook>> {
    ERROR_HOOK.get_or_init(|| RwLock::new(None))
}

/// Install the process-wide handler for panics raised in scheduled effect
/// runs. Replaces any previously installed hook.
///
/// Without a hook, failures are reported through `tracing::error!`.
pub fn set_effect_error_hook(hook: impl Fn(&EffectError) + Send + Sync + 'static) {
    *error_hook().write() = Some(Box::new(hook));
}

fn report_effect_error(err: &EffectError) {
    let hook = error_hook().read();
    match hook.as_ref() {
        Some(hook) => hook(err),
        None => tracing::error!(
            target: "rill_core::effect",
            effect = err.effect.as_u64(),
            message = %err.message,
            "effect run panicked"
        ),
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct EffectCore {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    /// Sources read during the last run.
    dependencies: RwLock<IndexSet<SourceId>>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectCore {
    /// Run the effect function inside a tracking context, rebuilding the
    /// dependency set from what it reads.
    ///
    /// A run that unwinds keeps its previous dependency set, so the effect
    /// stays wired to its sources and re-runs on the next trigger.
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        {
            let _ctx = TrackingContext::enter(self.subscriber_id);
            let _deps = DependencyGuard::new(self.subscriber_id, &self.dependencies);
            (self.run)();
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectCore {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        // Effects have no cache to invalidate; being queued is the state.
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn run_scheduled(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute()));
        if let Err(payload) = outcome {
            let err = EffectError {
                effect: self.subscriber_id,
                message: payload_message(payload.as_ref()),
            };
            report_effect_error(&err);
        }
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Keep the `Effect` (or a clone) alive for as long as it should observe;
/// dropping the last handle unregisters it. Cloning shares the underlying
/// state.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
/// let count_in = count.clone();
///
/// let effect = Effect::new(move || {
///     tracing::info!(count = count_in.get(), "count changed");
/// });
///
/// count.set(5);
/// flush_effects(); // the effect re-runs here, not inside `set`
/// ```
pub struct Effect {
    core: Arc<EffectCore>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a new effect.
    ///
    /// The function runs immediately to perform the initial side effect and
    /// establish the dependency set; a panic in this first run propagates.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let core = Arc::new(EffectCore {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            dependencies: RwLock::new(IndexSet::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        let handle = Runtime::register(core.clone() as Arc<dyn Reactive>);
        core.execute();

        Self {
            core,
            _handle: Arc::new(handle),
        }
    }

    /// The effect's subscriber ID.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.core.subscriber_id
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every dependency set and prevents any further run,
    /// including runs already queued.
    pub fn dispose(&self) {
        self.core.disposed.store(true, Ordering::SeqCst);

        let deps: Vec<SourceId> = self.core.dependencies.write().drain(..).collect();
        Runtime::remove_dependencies(self.core.subscriber_id, deps.iter());
    }

    /// Whether the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::SeqCst)
    }

    /// How many times the effect has run (initial run included).
    pub fn run_count(&self) -> usize {
        self.core.run_count.load(Ordering::SeqCst)
    }

    /// The number of sources the last run read.
    pub fn dependency_count(&self) -> usize {
        self.core.dependencies.read().len()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.core.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{flush_effects, Signal};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_in = runs.clone();

        let _effect = Effect::new(move || {
            runs_in.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_reruns_after_flush() {
        let signal = Signal::new(0);
        let observed = Arc::new(AtomicI32::new(-1));

        let (signal_in, observed_in) = (signal.clone(), observed.clone());
        let effect = Effect::new(move || {
            observed_in.store(signal_in.get(), Ordering::SeqCst);
        });

        assert_eq!(observed.load(Ordering::SeqCst), 0);

        signal.set(42);
        flush_effects();

        assert_eq!(observed.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn multiple_writes_in_one_flush_run_once() {
        let signal = Signal::new(0);

        let signal_in = signal.clone();
        let effect = Effect::new(move || {
            let _ = signal_in.get();
        });
        assert_eq!(effect.run_count(), 1);

        signal.set(1);
        signal.set(2);
        signal.set(3);
        flush_effects();

        assert_eq!(effect.run_count(), 2);
        assert_eq!(signal.get(), 3);
    }

    #[test]
    fn disposed_effect_skips_queued_run() {
        let signal = Signal::new(0);

        let signal_in = signal.clone();
        let effect = Effect::new(move || {
            let _ = signal_in.get();
        });

        // Queue a run, then dispose before the flush.
        signal.set(1);
        effect.dispose();
        flush_effects();

        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 1);

        // Later writes must not revive it either.
        signal.set(2);
        flush_effects();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn scheduled_panic_is_isolated_and_effect_stays_active() {
        let signal = Signal::new(0);
        let reported = Arc::new(AtomicI32::new(0));

        let reported_in = reported.clone();
        set_effect_error_hook(move |_err| {
            reported_in.fetch_add(1, Ordering::SeqCst);
        });

        let signal_in = signal.clone();
        let observed = Arc::new(AtomicI32::new(0));
        let observed_in = observed.clone();
        let effect = Effect::new(move || {
            let v = signal_in.get();
            if v == 13 {
                panic!("unlucky");
            }
            observed_in.store(v, Ordering::SeqCst);
        });

        // The panicking run must not unwind out of the flush.
        signal.set(13);
        flush_effects();
        assert!(reported.load(Ordering::SeqCst) >= 1);

        // Still active: a later trigger runs it again.
        signal.set(2);
        flush_effects();
        assert_eq!(observed.load(Ordering::SeqCst), 2);
        drop(effect);
    }

    #[test]
    fn panic_before_any_read_keeps_the_dependency_set() {
        let signal = Signal::new(0);
        let failing = Arc::new(AtomicBool::new(false));
        let observed = Arc::new(AtomicI32::new(0));

        let (signal_in, failing_in, observed_in) =
            (signal.clone(), failing.clone(), observed.clone());
        let effect = Effect::new(move || {
            if failing_in.load(Ordering::SeqCst) {
                panic!("failed before reading anything");
            }
            observed_in.store(signal_in.get(), Ordering::SeqCst);
        });
        assert_eq!(effect.dependency_count(), 1);

        // This run panics before the signal read; the edge must survive.
        failing.store(true, Ordering::SeqCst);
        signal.set(1);
        flush_effects();
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert_eq!(effect.dependency_count(), 1);

        // A later write still triggers the effect.
        failing.store(false, Ordering::SeqCst);
        signal.set(2);
        flush_effects();
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }
}
