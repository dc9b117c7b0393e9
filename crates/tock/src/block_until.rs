// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::timeline::{Timeline, WatcherId};

/// A future that completes once enough waiters are registered with a clock.
///
/// An instance is created by calling [`ClockControl::block_until()`][crate::ClockControl::block_until].
/// The future re-checks the number of live waiters whenever a waiter is registered, fires
/// or is cancelled. It never completes on its own; bound it with a real timeout if the
/// waiters might never show up.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tock::ClockControl;
///
/// # async fn wait_for_sleepers(control: &ClockControl) {
/// // Wait for three tasks to go to sleep, then wake them all.
/// control.block_until(3).await;
/// control.advance(Duration::from_secs(2));
/// # }
/// ```
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct BlockUntil {
    timeline: Arc<Timeline>,
    count: usize,
    // Where the timeline keeps our waker between polls.
    slot: Option<WatcherId>,
}

impl BlockUntil {
    pub(crate) const fn new(timeline: Arc<Timeline>, count: usize) -> Self {
        Self {
            timeline,
            count,
            slot: None,
        }
    }
}

impl Future for BlockUntil {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.timeline.poll_block_until(this.count, &mut this.slot, cx)
    }
}

impl Drop for BlockUntil {
    fn drop(&mut self) {
        if let Some(id) = self.slot.take() {
            self.timeline.forget_watcher(id);
        }
    }
}
