//! Optional durations, optional intervals, and deadline arithmetic.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// A `Duration` that may be absent. Zero and `None` both mean "no limit",
/// so a config of `0` disables the corresponding deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalDuration(Option<Duration>);

impl OptionalDuration {
    /// No limit.
    pub const NONE: Self = Self(None);

    /// Limit to `d`. A zero `d` means no limit.
    #[must_use]
    pub fn new(d: Duration) -> Self {
        if d.is_zero() {
            Self(None)
        } else {
            Self(Some(d))
        }
    }

    /// Limit to `secs` seconds; zero means no limit.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The wrapped duration, if a limit is set.
    #[must_use]
    pub const fn get(self) -> Option<Duration> {
        self.0
    }

    /// The deadline this limit imposes, measured from now.
    #[must_use]
    pub fn deadline_from_now(self) -> Option<Instant> {
        self.0.map(|d| Instant::now() + d)
    }
}

impl From<Option<Duration>> for OptionalDuration {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Self::NONE, Self::new)
    }
}

impl fmt::Display for OptionalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{d:?}"),
            None => write!(f, "unlimited"),
        }
    }
}

/// An interval that never fires when disabled.
///
/// The keepalive loops select on one of these, so a zero configuration
/// turns the loop into a pure shutdown waiter.
#[derive(Debug)]
pub(crate) struct OptionalInterval(Option<Interval>);

impl OptionalInterval {
    /// Fire every `d`, the first time one full period from now.
    pub(crate) fn after(d: OptionalDuration) -> Self {
        Self(d.get().map(|d| {
            let mut interval = tokio::time::interval_at(Instant::now() + d, d);
            // A missed tick usually means the session was busy on the
            // transport; there is no point catching up on keepalives.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        }))
    }

    /// Wait for the next tick. Never completes when disabled.
    pub(crate) async fn tick(&mut self) -> Instant {
        match &mut self.0 {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

/// The earlier of two optional deadlines.
pub(crate) fn min_deadline(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Run `fut` against an optional deadline. A deadline already in the past
/// times out without polling `fut` at all.
pub(crate) async fn deadline_bound<F, T>(deadline: Option<Instant>, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    match deadline {
        None => Ok(fut.await),
        Some(d) => {
            if d <= Instant::now() {
                return Err(Error::Timeout);
            }
            tokio::time::timeout_at(d, fut).await.map_err(|_| Error::Timeout)
        }
    }
}
