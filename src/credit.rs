//! A shared byte-credit counter with blocking decrement, an error latch,
//! and a bounded maximum wait.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::{Error, Result};
use parking_lot::Mutex;
use std::pin::{pin, Pin};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Upper bound on any single wait for credit. A waiter stuck longer than
/// this latches [`Error::GlobalTimeout`] and releases every other waiter.
/// Teardown latches an error in every normal path, so this only fires if
/// a wakeup was lost somewhere.
pub(crate) const MAX_CREDIT_WAIT: Duration = Duration::from_secs(30 * 60);

/// A shared credit counter.
///
/// The [`Session`](crate::Session) uses one as its receive bucket: the
/// receive loop parks on it while the bucket is empty, and consumers
/// return credit as they drain their buffers. The count may go negative
/// by up to one frame because a `Psh` payload is only charged after it
/// has been read off the wire in full.
///
/// Once an error is latched with [`set_error`](Self::set_error), every
/// current and future wait returns that error.
pub struct Credit {
    // Relaxed everywhere: the counter is pure accounting, the bytes it
    // accounts for are handed over under the stream buffer locks.
    val: AtomicI32,
    err: Mutex<Option<Error>>,
    notify: Notify,
}

impl std::fmt::Debug for Credit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credit")
            .field("val", &self.val.load(Ordering::Relaxed))
            .field("err", &*self.err.lock())
            .finish_non_exhaustive()
    }
}

impl Credit {
    /// A counter starting at `initial`.
    #[must_use]
    pub fn new(initial: i32) -> Self {
        Self {
            val: AtomicI32::new(initial),
            err: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Current value. Racy by nature; for logs, metrics, and tests.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.val.load(Ordering::Relaxed)
    }

    /// Add `n` and wake all waiters.
    pub fn increment(&self, n: i32) {
        self.val.fetch_add(n, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Subtract `n` unconditionally, without waking anyone. This may
    /// drive the value negative; waiters block until `increment` brings
    /// it back above zero.
    pub fn consume(&self, n: i32) {
        self.val.fetch_sub(n, Ordering::Relaxed);
    }

    /// Latch `e` and wake all waiters. The first latched error wins and
    /// is returned by every wait from then on.
    pub fn set_error(&self, e: Error) {
        {
            let mut err = self.err.lock();
            if err.is_none() {
                *err = Some(e);
            }
        }
        self.notify.notify_waiters();
    }

    /// The latched error, if any.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.err.lock().clone()
    }

    /// Wake all waiters without changing anything, so they re-check the
    /// value and the latch.
    pub fn poke(&self) {
        self.notify.notify_waiters();
    }

    /// Take up to `n` credit, waiting while the counter is not positive.
    /// Grants `min(n, value)` once it is. A zero or negative `n` returns
    /// zero immediately, even when an error is latched.
    ///
    /// # Errors
    /// The latched error, or [`Error::GlobalTimeout`] after
    /// [`MAX_CREDIT_WAIT`].
    pub async fn decrement(&self, n: i32) -> Result<i32> {
        if n <= 0 {
            return Ok(0);
        }
        let bound = Instant::now() + MAX_CREDIT_WAIT;
        loop {
            let mut notified = pin!(self.notify.notified());
            // Register before checking so a wake landing between the
            // check and the await is not lost.
            notified.as_mut().enable();
            if let Some(e) = self.error() {
                return Err(e);
            }
            let mut cur = self.val.load(Ordering::Relaxed);
            while cur > 0 {
                let granted = cur.min(n);
                match self.val.compare_exchange_weak(
                    cur,
                    cur - granted,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return Ok(granted),
                    Err(actual) => cur = actual,
                }
            }
            self.bounded_wait(bound, notified).await?;
        }
    }

    /// Block until the value is positive, without taking any credit.
    ///
    /// # Errors
    /// Same as [`decrement`](Self::decrement).
    pub async fn wait_ready(&self) -> Result<()> {
        let bound = Instant::now() + MAX_CREDIT_WAIT;
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(e) = self.error() {
                return Err(e);
            }
            if self.val.load(Ordering::Relaxed) > 0 {
                return Ok(());
            }
            self.bounded_wait(bound, notified).await?;
        }
    }

    async fn bounded_wait(&self, bound: Instant, notified: Pin<&mut Notified<'_>>) -> Result<()> {
        if tokio::time::timeout_at(bound, notified).await.is_err() {
            self.set_error(Error::GlobalTimeout);
            return Err(Error::GlobalTimeout);
        }
        Ok(())
    }
}
