// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! This example demonstrates scheduling a callback and firing it with synchronous callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tock::ClockControl;

fn main() {
    // Callbacks run on the advancing thread, so their effects are visible once `advance` returns.
    let control = ClockControl::new().synchronous_callbacks(true);
    let clock = control.to_clock();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let handle = clock.after_func(Duration::from_secs(3), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Two seconds in, the callback is still pending.
    control.advance(Duration::from_secs(2));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // One more second and it runs exactly once.
    control.advance(Duration::from_secs(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The callback already ran, so there is nothing left to stop.
    assert!(!handle.stop());

    println!("callback ran {} time(s)", calls.load(Ordering::SeqCst));
}
