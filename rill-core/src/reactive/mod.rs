//! Fine-grained reactive primitives.
//!
//! This module implements the signal side of the engine: signals, computeds,
//! and effects, wired together by automatic dependency tracking.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state. When a signal's value is
//! read within a tracking context (a computed or effect), the signal
//! registers that context as a dependent. When the value changes, dependents
//! are notified, subject to an equality cut-off that suppresses writes of an
//! equal value.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. A dependency
//! write marks it dirty (push); the value recomputes on the next read
//! (pull), so derivations nobody reads cost nothing.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs when its
//! dependencies change. Runs are queued and executed at the end of the
//! current unit of work ([`flush_effects`] / [`batch`]), never inline with
//! the triggering write.
//!
//! # Implementation notes
//!
//! Dependency detection is transparent: a thread-local context stack records
//! which computation is evaluating, and every source read attributes itself
//! to the top of the stack. This approach (sometimes called "automatic
//! dependency tracking") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod runtime;
mod scheduler;
mod signal;
mod subscriber;

pub use computed::{Computed, ComputedState};
pub use context::TrackingContext;
pub use effect::{set_effect_error_hook, Effect};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use scheduler::{batch, flush_effects, pending_effects};
pub use signal::{ReadSignal, Signal};
pub use subscriber::{SourceId, SubscriberId};
