// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Clock, Timeout};

/// Extensions for the [`Future`] trait.
pub trait FutureExt: Future {
    /// Applies a virtual timeout to the future.
    ///
    /// The deadline is registered with `clock` right away and counts as a waiter. The
    /// returned future fails with a timeout error once the clock is advanced past it.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use futures::executor::block_on;
    /// use tock::{ClockControl, FutureExt};
    ///
    /// let control = ClockControl::new();
    /// let clock = control.to_clock();
    ///
    /// // A long-running operation
    /// let future = clock.sleep(Duration::from_millis(700));
    /// let future = future.timeout(Duration::from_millis(200), &clock);
    ///
    /// control.advance(Duration::from_millis(200));
    ///
    /// let timeout_error = block_on(future).unwrap_err();
    /// assert_eq!(timeout_error.to_string(), "future timed out");
    /// ```
    fn timeout(self, timeout: Duration, clock: &Clock) -> Timeout<Self>
    where
        Self: Sized,
    {
        Timeout::new(self, clock.sleep(timeout))
    }
}

impl<T> FutureExt for T where T: Future {}
