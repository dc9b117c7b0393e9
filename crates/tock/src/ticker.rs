// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use futures_channel::mpsc;
use futures_core::Stream;

use crate::Clock;
use crate::timeline::{Timeline, Waiter, WaiterId};

/// The shortest period a ticker accepts.
pub(crate) const TICK_RESOLUTION: Duration = Duration::from_millis(1);

/// A stream of periodic ticks driven by virtual time.
///
/// Each item is the virtual instant at which the tick fell due. When the clock advances by
/// several periods at once, the ticker fires once per elapsed period and every tick is
/// buffered until it is consumed, so an advance of `k` periods always yields `k` items.
///
/// An instance is created by calling [`Clock::ticker()`]. The stream never completes;
/// after [`stop`][Self::stop] it simply stops producing new items. Dropping the ticker
/// stops it.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use futures::StreamExt;
/// use futures::executor::block_on;
/// use tock::ClockControl;
///
/// let control = ClockControl::new();
/// let ticker = control.to_clock().ticker(Duration::from_secs(1));
///
/// control.advance(Duration::from_secs(3));
///
/// let ticks: Vec<_> = block_on(ticker.take(3).collect());
/// assert_eq!(
///     ticks,
///     [1, 2, 3].map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s))
/// );
/// ```
#[derive(Debug)]
pub struct Ticker {
    timeline: Arc<Timeline>,
    id: WaiterId,
    period: Duration,
    // Kept so that the stream stays open while the ticker is stopped, and to re-arm on reset.
    sender: mpsc::UnboundedSender<SystemTime>,
    receiver: mpsc::UnboundedReceiver<SystemTime>,
}

impl Ticker {
    pub(crate) fn new(clock: &Clock, period: Duration) -> Self {
        let timeline = Arc::clone(clock.timeline());
        let period = period.max(TICK_RESOLUTION);
        let (sender, receiver) = mpsc::unbounded();
        let id = arm(&timeline, period, &sender);

        Self {
            timeline,
            id,
            period,
            sender,
            receiver,
        }
    }

    /// Returns the period between two ticks.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stops the ticker.
    ///
    /// Ticks that fired before the call remain buffered and can still be consumed.
    /// Returns `false` if the ticker was already stopped.
    pub fn stop(&self) -> bool {
        self.timeline.cancel(self.id)
    }

    /// Restarts the ticker with a new period.
    ///
    /// The next tick falls due `period` after the current virtual time. Buffered ticks
    /// are kept.
    ///
    /// > **Note**: The minimum period is 1ms. Shorter periods are rounded up.
    pub fn reset(&mut self, period: Duration) {
        self.timeline.cancel(self.id);
        self.period = period.max(TICK_RESOLUTION);
        self.id = arm(&self.timeline, self.period, &self.sender);
    }
}

fn arm(timeline: &Timeline, period: Duration, sender: &mpsc::UnboundedSender<SystemTime>) -> WaiterId {
    timeline.register(
        period,
        Waiter::Tick {
            period,
            sender: sender.clone(),
        },
    )
}

impl Stream for Ticker {
    type Item = SystemTime;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.timeline.cancel(self.id);
    }
}
