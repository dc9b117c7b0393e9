// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::timeline::Timeline;
use crate::{BlockUntil, Clock, Result};

/// Controls the flow of virtual time.
///
/// `ClockControl` is the driver side of a virtual clock. Test code keeps the control and
/// hands [`Clock`]s created by [`ClockControl::to_clock`] to the code under test. Time only
/// moves when the control is told to move it.
///
/// Every clone of a `ClockControl`, and every `Clock` created from it, share the same timeline.
///
/// # Examples
///
/// ## Advancing time manually
///
/// ```
/// # use std::time::Duration;
/// # use tock::ClockControl;
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let now = clock.now();
///
/// // Advance the time by one second
/// control.advance(Duration::from_secs(1));
///
/// assert_eq!(clock.since(now), Duration::from_secs(1));
/// ```
///
/// ## Waiting for a sleeper before advancing
///
/// ```
/// # use std::time::Duration;
/// # use std::thread;
/// # use futures::executor::block_on;
/// # use tock::ClockControl;
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let sleeper = thread::spawn(move || block_on(clock.sleep(Duration::from_secs(3))));
///
/// // Make sure the sleep is registered before moving time, otherwise the
/// // advance could happen first and the sleeper would never wake.
/// block_on(control.block_until(1));
/// control.advance(Duration::from_secs(3));
///
/// sleeper.join().unwrap();
/// ```
///
/// # Callback firing mode
///
/// Callbacks registered with [`Clock::after_func`] run on their own thread by default, so
/// [`advance`][Self::advance] may return before they finish. Enable
/// [`synchronous_callbacks`][Self::synchronous_callbacks] to run them on the advancing
/// thread instead; `advance` then returns only after every due callback completed.
#[derive(Debug, Clone, Default)]
pub struct ClockControl {
    timeline: Arc<Timeline>,
}

impl ClockControl {
    /// Creates a new `ClockControl` instance.
    ///
    /// The clock starts at [`SystemTime::UNIX_EPOCH`], runs callbacks asynchronously
    /// and rejects backward moves.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::SystemTime;
    ///
    /// use tock::ClockControl;
    ///
    /// let clock = ClockControl::new().to_clock();
    ///
    /// assert_eq!(clock.now(), SystemTime::UNIX_EPOCH);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `ClockControl` instance starting at the specified time.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    ///
    /// use tock::ClockControl;
    ///
    /// let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    /// let clock = ClockControl::new_at(start).to_clock();
    ///
    /// assert_eq!(clock.now(), start);
    /// ```
    #[must_use]
    pub fn new_at(start: SystemTime) -> Self {
        Self {
            timeline: Arc::new(Timeline::new(start)),
        }
    }

    /// Determines whether [`after_func`][Clock::after_func] callbacks run on the advancing thread.
    ///
    /// When enabled, [`advance`][Self::advance] does not return until every callback that
    /// became due has completed. When disabled (the default), each callback is dispatched
    /// to its own thread and may still be running when `advance` returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::time::Duration;
    ///
    /// use tock::ClockControl;
    ///
    /// let control = ClockControl::new().synchronous_callbacks(true);
    /// let clock = control.to_clock();
    ///
    /// let called = Arc::new(AtomicBool::new(false));
    /// let flag = Arc::clone(&called);
    /// clock.after_func(Duration::from_secs(3), move || flag.store(true, Ordering::SeqCst));
    ///
    /// control.advance(Duration::from_secs(3));
    /// assert!(called.load(Ordering::SeqCst));
    /// ```
    #[must_use]
    pub fn synchronous_callbacks(self, enabled: bool) -> Self {
        self.timeline.set_synchronous_callbacks(enabled);
        self
    }

    /// Determines whether [`advance_to`][Self::advance_to] treats a target in the past as a
    /// zero advance instead of failing.
    #[must_use]
    pub fn clamp_backwards(self, enabled: bool) -> Self {
        self.timeline.set_clamp_backwards(enabled);
        self
    }

    /// Converts the `ClockControl` to a `Clock` instance.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock(Arc::clone(&self.timeline))
    }

    /// Manually advances the clock by the specified number of milliseconds.
    ///
    /// See [`advance`][Self::advance].
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Manually advances the clock by the specified duration.
    ///
    /// Every waiter whose deadline is at or before the new time fires, earliest deadline
    /// first and in registration order among equal deadlines. Sleepers, timers and tickers
    /// are signalled before this method returns. Tickers that fall due several times fire
    /// once per elapsed period.
    ///
    /// Advancing by [`Duration::ZERO`] fires waiters that are due exactly now.
    ///
    /// # Panics
    ///
    /// Panics if the clock would move past the range representable by [`SystemTime`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use tock::ClockControl;
    ///
    /// let control = ClockControl::new();
    /// let clock = control.to_clock();
    ///
    /// let now = clock.now();
    /// control.advance(Duration::from_secs(1));
    ///
    /// assert_eq!(clock.since(now), Duration::from_secs(1));
    /// ```
    pub fn advance(&self, duration: Duration) {
        self.timeline.advance(duration);
    }

    /// Advances the clock to the specified instant.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` lies before the current time, unless
    /// [`clamp_backwards`][Self::clamp_backwards] is enabled. The clock is left untouched and
    /// no waiter fires.
    ///
    /// # Panics
    ///
    /// Panics if the clock would move past the range representable by [`SystemTime`].
    pub fn advance_to(&self, target: SystemTime) -> Result<()> {
        self.timeline.advance_to(target)
    }

    /// Returns a future that completes once at least `count` waiters are registered with
    /// the clock at the same time.
    ///
    /// Sleeps, pending `after` futures, timers, tickers and `after_func` callbacks all count as
    /// waiters. Use this to make sure the code under test is waiting on the clock before
    /// advancing it. The future never times out on its own.
    ///
    /// From a thread that is not running an async runtime, drive it with
    /// `futures::executor::block_on`.
    #[must_use]
    pub fn block_until(&self, count: usize) -> BlockUntil {
        BlockUntil::new(Arc::clone(&self.timeline), count)
    }

    /// Returns the number of waiters currently registered with the clock.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.timeline.waiter_count()
    }

    /// Returns when the next waiter falls due, or `None` if no waiter can ever fire.
    #[must_use]
    pub fn next_deadline(&self) -> Option<SystemTime> {
        self.timeline.next_deadline()
    }
}

impl From<ClockControl> for Clock {
    fn from(control: ClockControl) -> Self {
        control.to_clock()
    }
}

impl From<&ClockControl> for Clock {
    fn from(control: &ClockControl) -> Self {
        control.to_clock()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(ClockControl: Send, Sync, Clone);
    }

    #[test]
    fn defaults_ok() {
        let control = ClockControl::new();

        assert_eq!(control.to_clock().now(), SystemTime::UNIX_EPOCH);
        assert_eq!(control.waiter_count(), 0);
        assert_eq!(control.next_deadline(), None);
    }

    #[test]
    fn new_at_ok() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(222);
        let clock = ClockControl::new_at(start).to_clock();

        assert_eq!(clock.now(), start);
    }

    #[test]
    fn advance_ok() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let now = clock.now();

        () = control.advance(Duration::from_secs(1));

        assert_eq!(clock.since(now), Duration::from_secs(1));
    }

    #[test]
    fn advance_millis_ok() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let now = clock.now();

        () = control.advance_millis(123);

        assert_eq!(clock.since(now), Duration::from_millis(123));
    }

    #[test]
    fn advance_to_ok() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let now = clock.now();

        control.advance_to(now + Duration::from_secs(1)).unwrap();

        assert_eq!(clock.since(now), Duration::from_secs(1));
    }

    #[test]
    fn advance_to_past_rejected() {
        let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        let clock = control.to_clock();
        let now = clock.now();

        let error = control.advance_to(now - Duration::from_secs(1)).unwrap_err();

        assert!(error.is_backwards());
        assert_eq!(clock.now(), now);
    }

    #[test]
    fn advance_to_past_clamped() {
        let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(10)).clamp_backwards(true);
        let clock = control.to_clock();
        let now = clock.now();

        control.advance_to(now - Duration::from_secs(1)).unwrap();

        assert_eq!(clock.now(), now);
    }

    #[test]
    fn clones_share_timeline() {
        let control = ClockControl::new();
        let clone = control.clone();
        let clock: Clock = (&control).into();

        clone.advance(Duration::from_secs(5));

        assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(5));
        assert_eq!(Clock::from(control).now(), clock.now());
    }

    #[test]
    fn waiter_count_tracks_registrations() {
        let control = ClockControl::new();
        let clock = control.to_clock();

        let sleep = clock.sleep(Duration::from_secs(1));
        let _ticker = clock.ticker(Duration::from_secs(1));
        assert_eq!(control.waiter_count(), 2);
        assert_eq!(control.next_deadline(), Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1)));

        drop(sleep);
        assert_eq!(control.waiter_count(), 1);
    }

    #[test]
    fn synchronous_callbacks_complete_before_advance_returns() {
        let control = ClockControl::new().synchronous_callbacks(true);
        let clock = control.to_clock();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        clock.after_func(Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        control.advance(Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        control.advance(Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        control.advance(Duration::from_secs(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
