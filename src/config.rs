//! Session configuration.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::frame::MAX_PAYLOAD_SIZE;
use crate::timing::OptionalDuration;
use crate::{Error, Result};

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct Config {
    /// Period between outbound `Nop` keepalive frames. Disabled when
    /// unset; the peer's watchdog then has to be fed by real traffic.
    pub keepalive_interval: OptionalDuration,
    /// Watchdog period: the peer is considered dead and the session is
    /// closed when no frame at all arrived within one period. Disabled
    /// when unset.
    pub keepalive_timeout: OptionalDuration,
    /// Largest payload placed in a single `Psh` frame. At most 65535.
    pub max_frame_size: usize,
    /// Receive-side credit shared by all streams of the session, in
    /// bytes. The receive loop stops pulling new frames off the
    /// transport once this is spent.
    pub max_receive_buffer: usize,
    /// Deadline for a single transport read in the receive loop. The
    /// session dies when it elapses, so leave it unset unless the
    /// keepalive watchdog is disabled.
    pub read_timeout: OptionalDuration,
    /// Deadline for putting one frame on the wire, including the wait for
    /// the send lock.
    pub write_timeout: OptionalDuration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keepalive_interval: OptionalDuration::from_secs(10),
            keepalive_timeout: OptionalDuration::from_secs(30),
            max_frame_size: 4096,
            max_receive_buffer: 4 * 1024 * 1024,
            read_timeout: OptionalDuration::NONE,
            write_timeout: OptionalDuration::from_secs(20),
        }
    }
}

impl Config {
    /// Check for values the protocol cannot honor.
    ///
    /// # Errors
    /// [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 || self.max_frame_size > MAX_PAYLOAD_SIZE {
            return Err(Error::Config("max_frame_size must be between 1 and 65535"));
        }
        if self.max_receive_buffer < self.max_frame_size {
            return Err(Error::Config(
                "max_receive_buffer must hold at least one frame",
            ));
        }
        if i32::try_from(self.max_receive_buffer).is_err() {
            return Err(Error::Config("max_receive_buffer must fit in an i32"));
        }
        if let (Some(interval), Some(timeout)) = (
            self.keepalive_interval.get(),
            self.keepalive_timeout.get(),
        ) {
            if interval >= timeout {
                return Err(Error::Config(
                    "keepalive_interval must be smaller than keepalive_timeout",
                ));
            }
        }
        Ok(())
    }
}
