// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use futures_channel::oneshot;

use crate::Clock;
use crate::timeline::{Timeline, Waiter, WaiterId};

/// A future that resolves once a duration of virtual time has passed.
///
/// The output is the virtual instant at which the future fell due. Use it where several
/// event sources are awaited together (for example with `select!`) and the moment of
/// expiry matters.
///
/// An instance is created by calling [`Clock::after()`]. The deadline is registered with
/// the clock right away; dropping the future before it resolves removes the registration.
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
/// let after = clock.after(Duration::from_secs(5));
/// control.advance(Duration::from_secs(7));
///
/// // The instant reported is the deadline, not the time the clock was advanced to.
/// assert_eq!(block_on(after), clock.now() - Duration::from_secs(2));
/// ```
#[derive(Debug)]
pub struct After {
    timeline: Arc<Timeline>,
    // `None` once the future resolved.
    id: Option<WaiterId>,
    receiver: oneshot::Receiver<SystemTime>,
}

impl After {
    pub(crate) fn new(clock: &Clock, duration: Duration) -> Self {
        let timeline = Arc::clone(clock.timeline());
        let (sender, receiver) = oneshot::channel();
        let id = timeline.register(duration, Waiter::Sleep(sender));

        Self {
            timeline,
            id: Some(id),
            receiver,
        }
    }
}

impl Future for After {
    type Output = SystemTime;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(at)) => {
                this.id = None;
                Poll::Ready(at)
            }
            // The sender only goes away without firing when the waiter is cancelled, and
            // only `Drop` cancels it.
            Poll::Ready(Err(oneshot::Canceled)) | Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for After {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.timeline.cancel(id);
        }
    }
}

/// Suspends the calling task until a duration of virtual time has passed.
///
/// An instance is created by calling [`Clock::sleep()`]. Like [`After`], the deadline is
/// registered when the sleep is created, so [`ClockControl::block_until`][crate::ClockControl::block_until]
/// counts it before the first poll.
///
/// If the duration is [`Duration::ZERO`], the sleep completes immediately.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tock::Clock;
///
/// # async fn sleep_example(clock: &Clock) {
/// let stopwatch = clock.stopwatch();
///
/// clock.sleep(Duration::from_secs(3)).await;
///
/// assert!(stopwatch.elapsed() >= Duration::from_secs(3));
/// # }
/// ```
#[derive(Debug)]
pub struct Sleep(After);

impl Sleep {
    pub(crate) fn new(clock: &Clock, duration: Duration) -> Self {
        Self(After::new(clock, duration))
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx).map(drop)
    }
}
