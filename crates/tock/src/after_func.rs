// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::Clock;
use crate::timeline::{Callback, Timeline, Waiter, WaiterId};

/// A handle to a callback scheduled with [`Clock::after_func()`].
///
/// The handle can stop the callback before it runs or reschedule it. Unlike the other
/// waiters, dropping the handle leaves the callback scheduled.
pub struct AfterFunc {
    timeline: Arc<Timeline>,
    id: WaiterId,
    callback: Callback,
}

impl AfterFunc {
    pub(crate) fn new(clock: &Clock, duration: Duration, callback: Callback) -> Self {
        let timeline = Arc::clone(clock.timeline());
        let id = timeline.register(duration, Waiter::Callback(Arc::clone(&callback)));

        Self { timeline, id, callback }
    }

    /// Prevents the callback from running.
    ///
    /// Returns `true` if the call stopped the callback, or `false` if the callback already
    /// ran (or was dispatched to run) or was stopped before.
    pub fn stop(&self) -> bool {
        self.timeline.cancel(self.id)
    }

    /// Schedules the callback to run `duration` after the current virtual time.
    ///
    /// The callback runs again even if it already ran. Returns `true` if a pending run
    /// was replaced.
    pub fn reset(&mut self, duration: Duration) -> bool {
        let pending = self.timeline.cancel(self.id);
        self.id = self.timeline.register(duration, Waiter::Callback(Arc::clone(&self.callback)));
        pending
    }
}

impl fmt::Debug for AfterFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterFunc").field("id", &self.id).finish_non_exhaustive()
    }
}
