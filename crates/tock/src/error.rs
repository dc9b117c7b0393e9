// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::SystemTime;

/// The result type for fallible clock operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur when driving or waiting on a virtual clock.
///
/// Two situations produce errors:
///
/// * Asking the clock to move backwards, e.g. [`ClockControl::advance_to`][crate::ClockControl::advance_to]
///   with an instant that already passed.
/// * A [`Timeout`][crate::Timeout] reaching its deadline before the wrapped future completes.
///
/// # Limited introspection
///
/// Other than implementing the [`std::error::Error`] and [`core::fmt::Debug`] traits, this error type
/// only tells you which of the situations above occurred.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use tock::ClockControl;
///
/// let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(10));
///
/// let error = control.advance_to(SystemTime::UNIX_EPOCH).unwrap_err();
/// assert!(error.is_backwards());
/// ```
#[derive(Debug)]
pub struct Error(ErrorKind);

#[derive(Debug)]
enum ErrorKind {
    Backwards { now: SystemTime, target: SystemTime },
    TimedOut,
}

impl Error {
    const fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) const fn backwards(now: SystemTime, target: SystemTime) -> Self {
        Self::from_kind(ErrorKind::Backwards { now, target })
    }

    pub(crate) const fn timed_out() -> Self {
        Self::from_kind(ErrorKind::TimedOut)
    }

    /// Returns `true` if the clock was asked to move to an instant in its past.
    #[must_use]
    pub const fn is_backwards(&self) -> bool {
        matches!(self.0, ErrorKind::Backwards { .. })
    }

    /// Returns `true` if a future did not complete before its deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.0, ErrorKind::TimedOut)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorKind::Backwards { now, target } => {
                let behind = now.duration_since(*target).unwrap_or_default();
                write!(f, "the clock cannot move backwards: the target instant is {behind:?} in the past")
            }
            ErrorKind::TimedOut => write!(f, "future timed out"),
        }
    }
}

impl std::error::Error for Error {}
