// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use crate::Clock;
use crate::timeline::Timeline;

/// Measures elapsed virtual time.
///
/// An instance of `Stopwatch` is created by calling [`Clock::stopwatch()`] or by passing
/// a [`Clock`] to the [`Stopwatch::new()`] constructor. The measurement only moves when
/// the clock is advanced.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tock::ClockControl;
///
/// let control = ClockControl::new();
/// let stopwatch = control.to_clock().stopwatch();
///
/// control.advance(Duration::from_secs(2));
///
/// assert_eq!(stopwatch.elapsed(), Duration::from_secs(2));
/// ```
#[derive(Debug)]
pub struct Stopwatch {
    timeline: Arc<Timeline>,
    // Position on the timeline when the stopwatch was created.
    start: Duration,
}

impl Stopwatch {
    /// Creates a stopwatch that starts at the current virtual time.
    ///
    /// > **Note**: Consider using [`Clock::stopwatch()`] as a shortcut for creating stopwatches.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        let timeline = Arc::clone(clock.timeline());
        let start = timeline.elapsed();

        Self { timeline, start }
    }

    /// Returns the virtual time elapsed since the stopwatch was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timeline.elapsed().saturating_sub(self.start)
    }
}

impl From<Stopwatch> for Duration {
    fn from(stopwatch: Stopwatch) -> Self {
        stopwatch.elapsed()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;
    use crate::ClockControl;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Stopwatch: Send, Sync);
    }

    #[test]
    fn stopwatch_with_control() {
        let control = ClockControl::new();
        let clock = control.to_clock();

        control.advance(Duration::from_secs(5));
        let watch = Stopwatch::new(&clock);
        sleep(Duration::from_millis(1));
        assert_eq!(watch.elapsed(), Duration::ZERO);

        control.advance(Duration::from_secs(1));
        assert_eq!(watch.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn stopwatch_into_duration() {
        let control = ClockControl::new();
        let watch = control.to_clock().stopwatch();
        control.advance(Duration::from_secs(1));

        let duration: Duration = watch.into();
        assert_eq!(duration, Duration::from_secs(1));
    }
}
