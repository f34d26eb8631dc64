//! Error types for the reactive engine.
//!
//! Most operations in this crate are total: signal reads and writes cannot
//! fail. The failures that do exist fall into two camps with deliberately
//! different handling:
//!
//! - [`CycleError`]: a computed re-entered its own evaluation. Fatal to that
//!   read and surfaced to the caller (`Computed::try_get` returns it,
//!   `Computed::get` panics with it).
//!
//! - [`EffectError`]: a scheduled effect run panicked. Caught and routed to
//!   a process-wide hook rather than propagated to whichever write triggered
//!   the run; the effect stays active.
//!
//! Stream observer panics are neither: they propagate synchronously to the
//! caller of `next`, and callers needing isolation must wrap each observer.

use thiserror::Error;

use crate::reactive::{SourceId, SubscriberId};

/// A computed value's definition read itself, directly or transitively.
///
/// Raised when evaluating a computed re-enters that same computed before the
/// first evaluation has finished (A depends on B depends on A). Detected via
/// a per-computed "currently evaluating" marker rather than stack inspection,
/// so it reports before any unbounded recursion occurs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cyclic dependency: computed source {} re-entered during its own evaluation", computed.as_u64())]
pub struct CycleError {
    /// The computed whose evaluation was re-entered.
    pub computed: SourceId,
}

/// A scheduled effect run panicked.
///
/// Delivered to the hook installed with
/// [`set_effect_error_hook`](crate::reactive::set_effect_error_hook); never
/// rethrown to the write that triggered the run.
#[derive(Debug, Clone, Error)]
#[error("effect {} panicked during scheduled run: {message}", effect.as_u64())]
pub struct EffectError {
    /// The effect whose run panicked.
    pub effect: SubscriberId,
    /// Panic payload rendered as text, when it was a string.
    pub message: String,
}
