// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use futures_channel::oneshot;

use crate::Clock;
use crate::timeline::{Timeline, Waiter, WaiterId};

/// A one-shot timer that can be stopped and reset.
///
/// The timer is a future that resolves to the virtual instant at which it fired. A stopped
/// timer never resolves until it is [reset][Self::reset].
///
/// An instance is created by calling [`Clock::timer()`]. Dropping the timer stops it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use futures::executor::block_on;
/// use tock::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let mut timer = clock.timer(Duration::from_secs(5));
/// control.advance(Duration::from_secs(3));
///
/// // Push the deadline out to 5 seconds from now.
/// assert!(timer.reset(Duration::from_secs(5)));
/// control.advance(Duration::from_secs(5));
///
/// assert_eq!(block_on(timer), clock.now());
/// ```
#[derive(Debug)]
pub struct Timer {
    timeline: Arc<Timeline>,
    id: WaiterId,
    receiver: oneshot::Receiver<SystemTime>,
}

impl Timer {
    pub(crate) fn new(clock: &Clock, duration: Duration) -> Self {
        let timeline = Arc::clone(clock.timeline());
        let (id, receiver) = arm(&timeline, duration);

        Self { timeline, id, receiver }
    }

    /// Stops the timer.
    ///
    /// Returns `true` if the call stopped a pending timer, or `false` if the timer had
    /// already fired or been stopped.
    pub fn stop(&self) -> bool {
        self.timeline.cancel(self.id)
    }

    /// Re-arms the timer to fire `duration` after the current virtual time.
    ///
    /// Any pending firing is discarded, including one that fired but was not awaited yet.
    /// Returns `true` if the timer was still pending before the reset.
    pub fn reset(&mut self, duration: Duration) -> bool {
        let pending = self.timeline.cancel(self.id);
        (self.id, self.receiver) = arm(&self.timeline, duration);
        pending
    }
}

fn arm(timeline: &Timeline, duration: Duration) -> (WaiterId, oneshot::Receiver<SystemTime>) {
    let (sender, receiver) = oneshot::channel();
    (timeline.register(duration, Waiter::Sleep(sender)), receiver)
}

impl Future for Timer {
    type Output = SystemTime;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(at)) => Poll::Ready(at),
            // Stopped; wait for a reset.
            Poll::Ready(Err(oneshot::Canceled)) | Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.timeline.cancel(self.id);
    }
}
