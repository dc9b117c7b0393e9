// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(
    test,
    allow(
        clippy::arithmetic_side_effects,
        clippy::unchecked_time_subtraction,
        reason = "allow these lints in tests to improve the readability of the tests"
    )
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A virtual clock for deterministic testing of time-dependent code.
//!
//! Code under test asks a [`Clock`] for the time and waits on it: it sleeps, arms timers,
//! runs tickers and schedules callbacks. Test code holds the matching [`ClockControl`] and
//! decides when virtual time moves. Nothing ever waits on real time, so a test of a
//! one-hour retry loop completes in microseconds and never flakes on a busy machine.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use futures::executor::block_on;
//! use tock::{Clock, ClockControl};
//!
//! async fn produce_value(clock: &Clock) -> u64 {
//!     let stopwatch = clock.stopwatch();
//!     clock.sleep(Duration::from_secs(60)).await;
//!     assert_eq!(stopwatch.elapsed(), Duration::from_secs(60));
//!     123
//! }
//!
//! let control = ClockControl::new();
//! let clock = control.to_clock();
//! let worker = std::thread::spawn(move || block_on(produce_value(&clock)));
//!
//! // Wait for the worker to go to sleep, then let a minute pass.
//! block_on(control.block_until(1));
//! control.advance(Duration::from_secs(60));
//!
//! assert_eq!(worker.join().unwrap(), 123);
//! ```
//!
//! # Overview
//!
//! - [`Clock`] - The handle code under test uses to read the time and wait on it.
//! - [`ClockControl`] - Moves virtual time and synchronizes with waiting code.
//! - [`Sleep`] and [`After`] - Futures that complete once a duration passed.
//! - [`Timer`] - A one-shot timer that can be stopped and reset.
//! - [`Ticker`] - A stream of periodic ticks.
//! - [`AfterFunc`] - A handle to a scheduled callback.
//! - [`BlockUntil`] - Waits until a number of waiters are registered.
//! - [`Stopwatch`] - Measures elapsed virtual time.
//! - [`FutureExt`] - Adds virtual timeouts to any future.
//! - [`Error`] - Represents an error that can occur when driving or waiting on the clock.
//!
//! # Firing order
//!
//! Every sleep, timer, ticker and callback is a *waiter* with a deadline on the virtual
//! timeline. When the clock advances, due waiters fire earliest deadline first; waiters with
//! the same deadline fire in the order they were registered. A waiter registered while the
//! clock is advancing (for example from a callback) fires within the same advance if it is
//! already due.
//!
//! # Synchronizing with waiting code
//!
//! Advancing the clock before the code under test registered its sleep means the sleep
//! starts after the advance and never completes. [`ClockControl::block_until`] closes that
//! gap: it waits until the given number of waiters are registered at once.
//!
//! ```
//! use std::time::Duration;
//!
//! use tock::ClockControl;
//!
//! # async fn sleepers(control: ClockControl) {
//! let clock = control.to_clock();
//!
//! for secs in [1, 2, 2] {
//!     let clock = clock.clone();
//!     tokio::spawn(async move { clock.sleep(Duration::from_secs(secs)).await });
//! }
//!
//! control.block_until(3).await;
//! control.advance(Duration::from_secs(2));
//! # }
//! ```
//!
//! # Logging
//!
//! The clock emits [`tracing`](https://docs.rs/tracing) events: each advance logs the number of
//! fired and remaining waiters at `DEBUG` level, and registrations and cancellations are logged
//! at `TRACE` level.

mod after;
mod after_func;
mod block_until;
mod clock;
mod clock_control;
mod error;
mod future_ext;
mod stopwatch;
mod ticker;
mod timeline;
mod timeout;
mod timer;

#[cfg(test)]
mod testing;

pub use after::{After, Sleep};
pub use after_func::AfterFunc;
pub use block_until::BlockUntil;
pub use clock::Clock;
pub use clock_control::ClockControl;
pub use error::{Error, Result};
pub use future_ext::FutureExt;
pub use stopwatch::Stopwatch;
pub use ticker::Ticker;
pub use timeout::Timeout;
pub use timer::Timer;
