// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![expect(clippy::unwrap_used, reason = "example code")]

//! This example demonstrates how to test a function that sleeps.
//!
//! The worker goes to sleep for three seconds. The driver waits until the sleep is
//! registered, then moves virtual time forward by an hour, which wakes the worker at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use tock::{Clock, ClockControl};

async fn my_func(clock: Clock, counter: Arc<AtomicUsize>) {
    clock.sleep(Duration::from_secs(3)).await;
    counter.fetch_add(1, Ordering::SeqCst);
}

fn main() {
    let control = ClockControl::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let worker = {
        let clock = control.to_clock();
        let counter = Arc::clone(&counter);
        thread::spawn(move || block_on(my_func(clock, counter)))
    };

    // Without this, the advance could happen before the worker starts sleeping.
    block_on(control.block_until(1));

    // Nothing happened yet; virtual time did not move.
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    control.advance(Duration::from_secs(3600));
    worker.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    println!("worker woke up at {:?}", control.to_clock().now());
}
