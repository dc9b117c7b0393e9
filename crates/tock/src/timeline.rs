// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, ThreadId};
use std::time::{Duration, SystemTime};

use futures_channel::{mpsc, oneshot};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::Level;

use crate::{Error, Result};

/// A callback registered through [`Clock::after_func`][crate::Clock::after_func].
pub(crate) type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Identifies a waiter for its whole life, including across ticker re-arms.
///
/// Identifiers are handed out in registration order, so they double as the
/// tie-break between waiters that share a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WaiterId(u64);

/// Position of a waiter in the firing order.
///
/// Ordered by deadline first and registration order second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WaiterKey {
    deadline: Duration,
    id: WaiterId,
}

/// A pending time-based request.
pub(crate) enum Waiter {
    /// Wakes a single task blocked on a sleep, `after` or timer.
    Sleep(oneshot::Sender<SystemTime>),

    /// Runs a callback according to the clock's firing mode.
    Callback(Callback),

    /// Delivers a tick and re-arms itself `period` later.
    Tick {
        period: Duration,
        sender: mpsc::UnboundedSender<SystemTime>,
    },
}

impl Waiter {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Sleep(_) => "sleep",
            Self::Callback(_) => "callback",
            Self::Tick { .. } => "tick",
        }
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick { period, .. } => f.debug_struct("Tick").field("period", period).finish_non_exhaustive(),
            _ => f.write_str(self.kind()),
        }
    }
}

/// A waiter extracted from the timeline that must be fired outside the lock.
enum Firing {
    Sleep(oneshot::Sender<SystemTime>, SystemTime),
    Callback(Callback, bool),
    Tick(mpsc::UnboundedSender<SystemTime>, SystemTime),
}

impl Firing {
    fn fire(self) {
        match self {
            // The receiver may be gone already; there is nobody left to wake then.
            Self::Sleep(sender, at) => {
                _ = sender.send(at);
            }
            Self::Tick(sender, at) => {
                _ = sender.unbounded_send(at);
            }
            Self::Callback(callback, true) => callback(),
            Self::Callback(callback, false) => spawn_callback(callback),
        }
    }
}

fn spawn_callback(callback: Callback) {
    let detached = Arc::clone(&callback);

    if let Err(error) = thread::Builder::new()
        .name("tock-after-func".to_string())
        .spawn(move || detached())
    {
        tracing::event!(
            name: "tock.callback.spawn_failed",
            Level::WARN,
            error = %error,
            "running the callback on the advancing thread instead",
        );

        callback();
    }
}

/// The virtual timeline shared by a [`ClockControl`][crate::ClockControl] and all
/// of its [`Clock`][crate::Clock]s.
///
/// All state lives behind a single mutex. The mutex is never held while a waiter
/// fires or while a caller waits, so fired callbacks can re-enter the clock.
///
/// Firing happens in passes, and only one pass runs at a time. A thread that makes
/// waiters due while another thread runs a pass waits for that pass to end, so every
/// waiter an advance made due has fired by the time the advance returns.
#[derive(Debug, Default)]
pub(crate) struct Timeline {
    state: Mutex<State>,
    pass_ended: Condvar,
}

/// How a firing request made from inside a running pass on the same thread behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reentry {
    /// Leave due waiters to the enclosing pass, which fires them in order.
    Defer,
    /// Fire due waiters before returning.
    Drain,
}

impl Timeline {
    pub fn new(start: SystemTime) -> Self {
        Self {
            state: Mutex::new(State::new(start)),
            pass_ended: Condvar::new(),
        }
    }

    pub fn now(&self) -> SystemTime {
        self.with_state(|s| s.now())
    }

    pub fn elapsed(&self) -> Duration {
        self.with_state(|s| s.elapsed)
    }

    pub fn set_synchronous_callbacks(&self, enabled: bool) {
        self.with_state(|s| s.synchronous_callbacks = enabled);
    }

    pub fn set_clamp_backwards(&self, enabled: bool) {
        self.with_state(|s| s.clamp_backwards = enabled);
    }

    pub fn waiter_count(&self) -> usize {
        self.with_state(|s| s.waiters.len())
    }

    pub fn next_deadline(&self) -> Option<SystemTime> {
        self.with_state(|s| {
            let key = s.waiters.keys().next()?;
            s.start.checked_add(key.deadline)
        })
    }

    /// Registers a waiter due `offset` from now.
    ///
    /// A waiter with a zero offset is due right away. It fires before this returns,
    /// unless it was registered by a waiter firing on this thread; the running pass
    /// then fires it after every waiter that was due before it.
    pub fn register(&self, offset: Duration, waiter: Waiter) -> WaiterId {
        let mut state = self.state.lock();
        let id = state.next_id();
        let deadline = state.elapsed.saturating_add(offset);

        tracing::event!(
            name: "tock.register",
            Level::TRACE,
            waiter.id = id.0,
            waiter.kind = waiter.kind(),
            waiter.deadline = ?deadline,
        );

        state.insert(WaiterKey { deadline, id }, waiter);
        let watchers = state.take_watchers();

        if deadline <= state.elapsed {
            self.fire_due(state, Reentry::Defer);
        } else {
            drop(state);
        }

        wake_all(watchers);
        id
    }

    /// Removes a live waiter.
    ///
    /// Returns `false` if the waiter already fired or was cancelled before.
    pub fn cancel(&self, id: WaiterId) -> bool {
        let (removed, watchers) = self.with_state(|s| match s.remove(id) {
            Some(waiter) => {
                tracing::event!(name: "tock.cancel", Level::TRACE, waiter.id = id.0, waiter.kind = waiter.kind());
                (Some(waiter), s.take_watchers())
            }
            None => (None, Vec::new()),
        });

        wake_all(watchers);

        // Dropped outside the lock; dropping a sender wakes its receiver.
        removed.is_some()
    }

    /// Moves virtual time forward and fires every waiter that became due.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.advance(duration);

        let fired = self.fire_due(state, Reentry::Drain);
        self.log_advance(duration, fired);
    }

    /// Moves virtual time to an absolute instant.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` lies before the current time and the timeline
    /// does not clamp backward moves. Nothing changes in that case.
    pub fn advance_to(&self, target: SystemTime) -> Result<()> {
        let mut state = self.state.lock();
        let now = state.now();

        let duration = match target.duration_since(now) {
            Ok(duration) => duration,
            Err(_) if state.clamp_backwards => {
                tracing::event!(
                    name: "tock.advance.clamped",
                    Level::DEBUG,
                    clock.now = ?now,
                    clock.target = ?target,
                    "target lies in the past, advancing by zero",
                );
                Duration::ZERO
            }
            Err(_) => {
                tracing::event!(
                    name: "tock.advance.rejected",
                    Level::DEBUG,
                    clock.now = ?now,
                    clock.target = ?target,
                    "target lies in the past",
                );
                return Err(Error::backwards(now, target));
            }
        };

        state.advance(duration);

        let fired = self.fire_due(state, Reentry::Drain);
        self.log_advance(duration, fired);
        Ok(())
    }

    /// Resolves once at least `count` waiters are live.
    ///
    /// The caller's waker is kept in `slot`, so polling again replaces it instead of
    /// adding another one.
    pub fn poll_block_until(&self, count: usize, slot: &mut Option<WatcherId>, cx: &Context<'_>) -> Poll<()> {
        self.with_state(|s| {
            if s.waiters.len() >= count {
                if let Some(id) = slot.take() {
                    s.watchers.remove(&id);
                }
                return Poll::Ready(());
            }

            let id = *slot.get_or_insert_with(|| s.next_watcher_id());

            match s.watchers.entry(id) {
                Entry::Occupied(mut entry) => entry.get_mut().clone_from(cx.waker()),
                Entry::Vacant(entry) => {
                    entry.insert(cx.waker().clone());
                }
            }

            Poll::Pending
        })
    }

    pub fn forget_watcher(&self, id: WatcherId) {
        self.with_state(|s| {
            s.watchers.remove(&id);
        });
    }

    #[cfg(test)]
    pub fn watcher_count(&self) -> usize {
        self.with_state(|s| s.watchers.len())
    }

    /// Fires every due waiter and returns how many this call fired.
    ///
    /// If another thread runs a pass, waits for it to end first; that pass also fires
    /// whatever the caller made due. A call coming from a waiter that fires on the
    /// thread running the pass is handled according to `reentry`.
    fn fire_due(&self, mut state: MutexGuard<'_, State>, reentry: Reentry) -> usize {
        let current = thread::current().id();

        while let Some(owner) = state.pass_owner {
            if owner == current {
                drop(state);

                return match reentry {
                    Reentry::Defer => 0,
                    Reentry::Drain => self.drain(),
                };
            }

            self.pass_ended.wait(&mut state);
        }

        state.pass_owner = Some(current);
        drop(state);

        let _pass = Pass(self);
        self.drain()
    }

    // Takes the lock once per waiter so that firing happens with the lock released.
    #[cfg_attr(test, mutants::skip)] // Causes test timeout.
    fn drain(&self) -> usize {
        let mut fired: usize = 0;

        while let Some(firing) = self.with_state(State::pop_due) {
            firing.fire();
            fired = fired.saturating_add(1);
        }

        if fired > 0 {
            wake_all(self.with_state(State::take_watchers));
        }

        fired
    }

    fn log_advance(&self, advanced_by: Duration, fired: usize) {
        let (elapsed, live) = self.with_state(|s| (s.elapsed, s.waiters.len()));

        tracing::event!(
            name: "tock.advance",
            Level::DEBUG,
            clock.advanced_by = ?advanced_by,
            clock.elapsed = ?elapsed,
            waiters.fired = fired,
            waiters.live = live,
        );
    }

    fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut State) -> R,
    {
        f(&mut self.state.lock())
    }
}

/// Marks the end of a firing pass when dropped, including when a callback panics.
#[derive(Debug)]
struct Pass<'a>(&'a Timeline);

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        self.0.with_state(|s| s.pass_owner = None);
        self.0.pass_ended.notify_all();
    }
}

/// Identifies the waker slot of one [`BlockUntil`][crate::BlockUntil] future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WatcherId(u64);

fn wake_all(watchers: Vec<Waker>) {
    watchers.into_iter().for_each(Waker::wake);
}

#[derive(Debug)]
struct State {
    start: SystemTime,
    elapsed: Duration,
    waiters: BTreeMap<WaiterKey, Waiter>,
    deadlines: HashMap<WaiterId, Duration>,
    last_id: u64,
    watchers: HashMap<WatcherId, Waker>,
    last_watcher_id: u64,
    // Thread running the current firing pass, if any.
    pass_owner: Option<ThreadId>,
    synchronous_callbacks: bool,
    clamp_backwards: bool,
}

impl Default for State {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl State {
    fn new(start: SystemTime) -> Self {
        Self {
            start,
            elapsed: Duration::ZERO,
            waiters: BTreeMap::new(),
            deadlines: HashMap::new(),
            last_id: 0,
            watchers: HashMap::new(),
            last_watcher_id: 0,
            pass_owner: None,
            synchronous_callbacks: false,
            clamp_backwards: false,
        }
    }

    fn now(&self) -> SystemTime {
        self.at(self.elapsed)
    }

    // Only called for points in time that were already reached, which `advance` keeps in range.
    fn at(&self, elapsed: Duration) -> SystemTime {
        self.start.checked_add(elapsed).expect(OUTSIDE_RANGE_MESSAGE)
    }

    fn advance(&mut self, duration: Duration) {
        let elapsed = self.elapsed.checked_add(duration).expect(OUTSIDE_RANGE_MESSAGE);
        assert!(self.start.checked_add(elapsed).is_some(), "{OUTSIDE_RANGE_MESSAGE}");
        self.elapsed = elapsed;
    }

    fn next_id(&mut self) -> WaiterId {
        self.last_id = self.last_id.wrapping_add(1);
        WaiterId(self.last_id)
    }

    fn next_watcher_id(&mut self) -> WatcherId {
        self.last_watcher_id = self.last_watcher_id.wrapping_add(1);
        WatcherId(self.last_watcher_id)
    }

    fn insert(&mut self, key: WaiterKey, waiter: Waiter) {
        self.deadlines.insert(key.id, key.deadline);
        self.waiters.insert(key, waiter);
    }

    fn remove(&mut self, id: WaiterId) -> Option<Waiter> {
        let deadline = self.deadlines.remove(&id)?;
        self.waiters.remove(&WaiterKey { deadline, id })
    }

    fn take_watchers(&mut self) -> Vec<Waker> {
        mem::take(&mut self.watchers).into_values().collect()
    }

    fn firing(&self, waiter: Waiter, deadline: Duration) -> Firing {
        let at = self.at(deadline);

        match waiter {
            Waiter::Sleep(sender) => Firing::Sleep(sender, at),
            Waiter::Callback(callback) => Firing::Callback(callback, self.synchronous_callbacks),
            Waiter::Tick { sender, .. } => Firing::Tick(sender, at),
        }
    }

    /// Extracts the earliest due waiter, re-arming it if it is periodic.
    fn pop_due(&mut self) -> Option<Firing> {
        let entry = self.waiters.first_entry()?;

        if entry.key().deadline > self.elapsed {
            return None;
        }

        let (key, waiter) = entry.remove_entry();

        match waiter {
            Waiter::Tick { period, sender } => {
                let firing = Firing::Tick(sender.clone(), self.at(key.deadline));
                let rearmed = WaiterKey {
                    deadline: key.deadline.saturating_add(period),
                    id: key.id,
                };
                self.insert(rearmed, Waiter::Tick { period, sender });
                Some(firing)
            }
            waiter => {
                self.deadlines.remove(&key.id);
                Some(self.firing(waiter, key.deadline))
            }
        }
    }
}

pub(crate) static OUTSIDE_RANGE_MESSAGE: &str = "moving the clock outside of the supported time range is not possible";
