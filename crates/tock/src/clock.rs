// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::timeline::Timeline;
use crate::{After, AfterFunc, Sleep, Stopwatch, Ticker, Timer};

/// Provides time-related operations backed by virtual time.
///
/// Code under test receives a `Clock` and uses it wherever it would otherwise read the
/// system time or wait: [`sleep`][Self::sleep], [`after`][Self::after], [`timer`][Self::timer],
/// [`ticker`][Self::ticker] and [`after_func`][Self::after_func]. Virtual time only moves when
/// the [`ClockControl`][crate::ClockControl] the clock was created from advances it, so a
/// one-hour sleep completes as soon as the test says an hour has passed.
///
/// # Registration happens at call time
///
/// Every waiting operation registers its deadline with the clock when it is called, not
/// when the returned future is first polled. A deadline is always relative to the virtual
/// time at the moment of the call, and [`ClockControl::block_until`][crate::ClockControl::block_until]
/// observes the registration immediately.
///
/// # Cloning and shared state
///
/// Cloning a clock is inexpensive (just an `Arc` clone) and every clone shares the same timeline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use futures::executor::block_on;
/// use tock::{Clock, ClockControl};
///
/// async fn produce_value(clock: &Clock) -> u64 {
///     clock.sleep(Duration::from_secs(60)).await;
///     123
/// }
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let value = std::thread::spawn(move || block_on(produce_value(&clock)));
///
/// block_on(control.block_until(1));
/// control.advance(Duration::from_secs(60));
///
/// assert_eq!(value.join().unwrap(), 123);
/// ```
#[derive(Debug, Clone)]
pub struct Clock(pub(crate) Arc<Timeline>);

impl Clock {
    /// Creates a new frozen clock.
    ///
    /// This is a convenience method equivalent to calling `ClockControl::new().to_clock()`.
    /// Since the control is dropped, time never moves for the returned clock.
    #[must_use]
    pub fn new_frozen() -> Self {
        crate::ClockControl::new().to_clock()
    }

    /// Creates a new frozen clock at the specified time.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    ///
    /// use tock::Clock;
    ///
    /// let specific_time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    /// let clock = Clock::new_frozen_at(specific_time);
    ///
    /// assert_eq!(clock.now(), specific_time);
    /// ```
    #[must_use]
    pub fn new_frozen_at(time: SystemTime) -> Self {
        crate::ClockControl::new_at(time).to_clock()
    }

    /// Retrieves the current virtual time.
    ///
    /// # Examples
    ///
    /// ```
    /// use tock::Clock;
    ///
    /// # fn retrieve_now(clock: &Clock) {
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    ///
    /// assert!(time2 >= time1);
    /// # }
    /// ```
    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.0.now()
    }

    /// Returns the virtual time elapsed since `earlier`.
    ///
    /// Returns [`Duration::ZERO`] if `earlier` is in the future.
    #[must_use]
    pub fn since(&self, earlier: SystemTime) -> Duration {
        self.now().duration_since(earlier).unwrap_or_default()
    }

    /// Returns the virtual time remaining until `later`.
    ///
    /// Returns [`Duration::ZERO`] if `later` already passed.
    #[must_use]
    pub fn until(&self, later: SystemTime) -> Duration {
        later.duration_since(self.now()).unwrap_or_default()
    }

    /// Creates a [`Sleep`] that completes once `duration` of virtual time has passed.
    ///
    /// A zero duration completes immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use tock::Clock;
    ///
    /// # async fn sleep_example(clock: &Clock) {
    /// let start = clock.now();
    ///
    /// clock.sleep(Duration::from_millis(10)).await;
    ///
    /// assert!(clock.since(start) >= Duration::from_millis(10));
    /// # }
    /// ```
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self, duration)
    }

    /// Creates an [`After`] that resolves to the instant it fell due once `duration` passed.
    #[must_use]
    pub fn after(&self, duration: Duration) -> After {
        After::new(self, duration)
    }

    /// Creates a [`Timer`] that fires once after `duration` and can be stopped or reset.
    #[must_use]
    pub fn timer(&self, duration: Duration) -> Timer {
        Timer::new(self, duration)
    }

    /// Creates a [`Ticker`] that delivers a tick every `period`.
    ///
    /// > **Note**: The minimum period is 1ms. Shorter periods are rounded up.
    #[must_use]
    pub fn ticker(&self, period: Duration) -> Ticker {
        Ticker::new(self, period)
    }

    /// Schedules `callback` to run once `duration` of virtual time has passed.
    ///
    /// Whether the callback runs on the advancing thread or on its own thread is decided by
    /// [`ClockControl::synchronous_callbacks`][crate::ClockControl::synchronous_callbacks].
    /// Dropping the returned handle does not cancel the callback; call
    /// [`AfterFunc::stop`] to do that.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::time::Duration;
    ///
    /// use tock::ClockControl;
    ///
    /// let control = ClockControl::new().synchronous_callbacks(true);
    /// let clock = control.to_clock();
    /// let calls = Arc::new(AtomicUsize::new(0));
    ///
    /// let counter = Arc::clone(&calls);
    /// clock.after_func(Duration::from_secs(3), move || {
    ///     counter.fetch_add(1, Ordering::SeqCst);
    /// });
    ///
    /// control.advance(Duration::from_secs(2));
    /// assert_eq!(calls.load(Ordering::SeqCst), 0);
    ///
    /// control.advance(Duration::from_secs(1));
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn after_func<F>(&self, duration: Duration, callback: F) -> AfterFunc
    where
        F: Fn() + Send + Sync + 'static,
    {
        AfterFunc::new(self, duration, Arc::new(callback))
    }

    /// Creates a new [`Stopwatch`] that starts measuring elapsed virtual time.
    #[must_use]
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch::new(self)
    }

    pub(crate) fn timeline(&self) -> &Arc<Timeline> {
        &self.0
    }
}

impl AsRef<Self> for Clock {
    fn as_ref(&self) -> &Self {
        self
    }
}
