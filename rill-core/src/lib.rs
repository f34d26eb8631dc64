//! Rill Core
//!
//! This crate implements a small reactive engine with two complementary
//! state-update models and a bridge between them:
//!
//! - Fine-grained signals: writable cells ([`Signal`]), memoized derivations
//!   ([`Computed`]), and side-effect runners ([`Effect`]) connected by
//!   automatic dependency tracking. Dirty marking is pushed at write time;
//!   values recompute lazily on read; effects run at the end of the current
//!   unit of work ([`flush_effects`] / [`batch`]).
//!
//! - Observable streams: multi-subscriber push sequences ([`Subject`]), a
//!   latest-value variant ([`BehaviorSubject`]), and lazy derived streams
//!   ([`Observable::map`]).
//!
//! - Interop: [`to_signal`] mirrors a stream's emissions into a read-only
//!   signal, so stream-produced values participate in dependency tracking
//!   like any other signal.
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_core::{flush_effects, Computed, Effect, Signal};
//!
//! let count = Signal::new(0);
//!
//! let count_for_double = count.clone();
//! let double = Computed::new(move || count_for_double.get() * 2);
//!
//! let count_for_log = count.clone();
//! let _effect = Effect::new(move || {
//!     tracing::info!(count = count_for_log.get(), "count changed");
//! });
//!
//! count.update(|v| v + 1);
//! flush_effects(); // the effect re-runs here
//! assert_eq!(double.get(), 2);
//! ```

pub mod error;
pub mod interop;
pub mod reactive;
pub mod stream;

pub use error::{CycleError, EffectError};
pub use interop::{to_signal, BridgedSignal};
pub use reactive::{
    batch, flush_effects, set_effect_error_hook, Computed, Effect, ReadSignal, Signal,
};
pub use stream::{BehaviorSubject, Observable, Subject, Subscription};
