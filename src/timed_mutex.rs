//! A mutex whose acquisition is bounded by a deadline.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::{Error, Result};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Mutual exclusion with a bounded wait.
///
/// The wrapped tokio mutex queues waiters FIFO, so contended acquisition
/// cannot starve under a bounded number of holders.
#[derive(Debug)]
pub(crate) struct TimedMutex<T>(Mutex<T>);

impl<T> TimedMutex<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    /// Acquire the lock before `deadline`, waiting indefinitely when no
    /// deadline is given. A deadline already in the past degrades to a
    /// non-blocking attempt.
    ///
    /// # Errors
    /// [`Error::Timeout`] when the deadline elapses first.
    pub(crate) async fn lock_deadline(
        &self,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'_, T>> {
        match deadline {
            None => Ok(self.0.lock().await),
            Some(d) if d <= Instant::now() => self.0.try_lock().map_err(|_| Error::Timeout),
            Some(d) => tokio::time::timeout_at(d, self.0.lock())
                .await
                .map_err(|_| Error::Timeout),
        }
    }

    /// Non-blocking attempt, for best-effort teardown paths.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.0.try_lock().ok()
    }
}
