//! Two counters, two reactivity models.
//!
//! The signal counter derives its double through a `Computed` and logs
//! through an `Effect`; the stream counter derives its double through
//! `map` and logs through a subscription. A read-only view and a bridged
//! signal round out the signal variants.
//!
//! Run with `cargo run --example counters`.

use rill_core::{batch, to_signal, BehaviorSubject, Computed, Effect, Observable, Signal};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Signal model: writable cell, computed double, logging effect.
    let count = Signal::new(0);

    let count_for_double = count.clone();
    let double = Computed::new(move || count_for_double.get() * 2);

    let count_for_log = count.clone();
    let _log = Effect::new(move || {
        tracing::info!(count = count_for_log.get(), "signal changed");
    });

    // Read-only view: hand this out and nobody can write the counter.
    let shielded = count.read_only();

    // Stream model: behavior subject, mapped double, logging subscription.
    let count_subject = BehaviorSubject::new(0);
    let double_stream = count_subject.map(|v: i32| v * 2);
    let _sub = double_stream.subscribe(|v| {
        tracing::info!(double = v, "stream double");
    });

    // Bridge: the subject's emissions, readable as a signal.
    let bridged = to_signal(&count_subject, 0);

    for click in 1..=3 {
        // The batch boundary is where the logging effect re-runs.
        batch(|| count.update(|v| v + 1));

        let next = count_subject.value() + 1;
        count_subject.next(next);
        tracing::info!(pushed = count_subject.value(), "subject pushed");

        tracing::info!(
            click,
            signal = count.get(),
            double = double.get(),
            shielded = shielded.get(),
            bridged = bridged.get(),
            "state after click"
        );
    }
}
