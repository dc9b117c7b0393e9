// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests that drive the clock through its public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use futures::StreamExt;
use futures::executor::block_on;
use tock::{Clock, ClockControl, FutureExt};

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

async fn my_func(clock: Clock, counter: Arc<AtomicUsize>) {
    clock.sleep(Duration::from_secs(3)).await;
    counter.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn sleeping_function_wakes_after_advance() {
    let control = ClockControl::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let worker = {
        let clock = control.to_clock();
        let counter = Arc::clone(&counter);
        thread::spawn(move || block_on(my_func(clock, counter)))
    };

    // Ensure the sleep is registered before moving time.
    block_on(control.block_until(1));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    control.advance(Duration::from_secs(3600));
    worker.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn after_func_runs_exactly_once() {
    let control = ClockControl::new().synchronous_callbacks(true);
    let clock = control.to_clock();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let _handle = clock.after_func(Duration::from_secs(3), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    control.advance(Duration::from_secs(2));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    control.advance(Duration::from_secs(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// The current-thread runtime runs woken tasks in the order they were woken, so the
// order in which the sleepers record themselves is the order in which they fired.
#[tokio::test]
async fn three_sleepers_wake_in_deadline_then_registration_order() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let woken = Arc::new(Mutex::new(Vec::new()));

    let sleepers: Vec<_> = [("first", 1), ("second", 2), ("third", 2)]
        .into_iter()
        .map(|(name, secs)| {
            let clock = clock.clone();
            let woken = Arc::clone(&woken);
            tokio::spawn(async move {
                let at = clock.after(Duration::from_secs(secs)).await;
                woken.lock().unwrap().push((name, at));
            })
        })
        .collect();

    control.block_until(3).await;
    control.advance(Duration::from_secs(2));

    for sleeper in sleepers {
        sleeper.await.unwrap();
    }

    assert_eq!(
        *woken.lock().unwrap(),
        [("first", at(1)), ("second", at(2)), ("third", at(2))]
    );
    assert_eq!(control.waiter_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sleepers_on_worker_threads_all_wake() {
    let control = ClockControl::new();
    let clock = control.to_clock();

    let sleepers: Vec<_> = [1, 2, 2]
        .into_iter()
        .map(|secs| {
            let clock = clock.clone();
            tokio::spawn(async move { clock.after(Duration::from_secs(secs)).await })
        })
        .collect();

    control.block_until(3).await;
    control.advance(Duration::from_secs(2));

    let mut woken = Vec::new();
    for sleeper in sleepers {
        woken.push(sleeper.await.unwrap());
    }
    woken.sort();

    assert_eq!(woken, [at(1), at(2), at(2)]);
}

#[test]
fn equal_deadlines_fire_in_registration_order() {
    let control = ClockControl::new().synchronous_callbacks(true);
    let clock = control.to_clock();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (name, secs) in [("a", 2), ("b", 1), ("c", 2)] {
        let order = Arc::clone(&order);
        clock.after_func(Duration::from_secs(secs), move || order.lock().unwrap().push(name));
    }

    control.advance(Duration::from_secs(2));

    assert_eq!(*order.lock().unwrap(), ["b", "a", "c"]);
}

#[test]
fn advance_to_past_is_rejected() {
    let control = ClockControl::new_at(at(100));
    let clock = control.to_clock();
    let sleep = clock.after(Duration::from_secs(1));

    let error = control.advance_to(at(50)).unwrap_err();

    assert!(error.is_backwards());
    assert_eq!(clock.now(), at(100));
    assert_eq!(control.waiter_count(), 1);

    control.advance_to(at(101)).unwrap();
    assert_eq!(block_on(sleep), at(101));
}

#[test]
fn asynchronous_callbacks_eventually_run() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let (sender, receiver) = std::sync::mpsc::channel();

    for id in 0..3 {
        let sender = sender.clone();
        clock.after_func(Duration::from_secs(1), move || {
            _ = sender.send(id);
        });
    }

    control.advance(Duration::from_secs(1));

    let mut ran: Vec<_> = (0..3)
        .map(|_| receiver.recv_timeout(Duration::from_secs(10)).unwrap())
        .collect();
    ran.sort_unstable();

    assert_eq!(ran, [0, 1, 2]);
}

#[test]
fn ticker_delivers_every_period() {
    let control = ClockControl::new();
    let mut ticker = control.to_clock().ticker(Duration::from_millis(250));

    control.advance(Duration::from_secs(1));

    let ticks: Vec<_> = block_on((&mut ticker).take(4).collect());
    let gaps: Vec<_> = ticks
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]).unwrap())
        .collect();

    assert_eq!(ticks[0], SystemTime::UNIX_EPOCH + Duration::from_millis(250));
    assert_eq!(gaps, [Duration::from_millis(250); 3]);
}

#[test]
fn callback_can_schedule_follow_up() {
    let control = ClockControl::new().synchronous_callbacks(true);
    let clock = control.to_clock();
    let calls = Arc::new(AtomicUsize::new(0));

    let inner_clock = clock.clone();
    let counter = Arc::clone(&calls);
    clock.after_func(Duration::from_secs(1), move || {
        let counter = Arc::clone(&counter);
        inner_clock.after_func(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    });

    control.advance(Duration::from_secs(1));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(control.waiter_count(), 1);

    control.advance(Duration::from_secs(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timeout_fires_on_virtual_deadline() {
    let control = ClockControl::new();
    let clock = control.to_clock();

    let slow = clock.sleep(Duration::from_secs(60)).timeout(Duration::from_secs(5), &clock);
    let task = tokio::spawn(slow);

    control.advance(Duration::from_secs(5));

    let error = task.await.unwrap().unwrap_err();
    assert!(error.is_timeout());
}
