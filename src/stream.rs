//! One logical byte stream inside a session.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::frame::{Cmd, Frame};
use crate::session::SessionInner;
use crate::timing;
use crate::{Error, Result};
use bytes::{Buf, Bytes};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// Receive side of one stream, shared between the session's receive loop
/// and the [`MuxStream`] handle.
pub(crate) struct StreamState {
    pub(crate) id: u32,
    buf: Mutex<RecvBuf>,
    /// Read-side wakeups: new data, peer `Fin`, teardown.
    notify: Notify,
    /// Set once the local side has committed to sending `Fin`.
    // Relaxed: the flag only gates duplicate Fins and failing reads, both
    // re-checked under the buffer lock or the send lock.
    local_closed: AtomicBool,
}

struct RecvBuf {
    chunks: VecDeque<Bytes>,
    /// Total bytes queued across `chunks`.
    buffered: usize,
    peer_closed: bool,
    /// Torn down: reads fail instead of draining.
    dead: bool,
}

impl std::fmt::Debug for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buf = self.buf.lock();
        f.debug_struct("StreamState")
            .field("id", &self.id)
            .field("buffered", &buf.buffered)
            .field("peer_closed", &buf.peer_closed)
            .field("local_closed", &self.local_closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl StreamState {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            buf: Mutex::new(RecvBuf {
                chunks: VecDeque::new(),
                buffered: 0,
                peer_closed: false,
                dead: false,
            }),
            notify: Notify::new(),
            local_closed: AtomicBool::new(false),
        }
    }

    /// Queue an inbound chunk. Returns `false` when the stream is already
    /// dead and the chunk was discarded, so the caller can refund the
    /// credit it charged.
    pub(crate) fn push(&self, chunk: Bytes) -> bool {
        {
            let mut buf = self.buf.lock();
            if buf.dead {
                return false;
            }
            buf.buffered += chunk.len();
            buf.chunks.push_back(chunk);
        }
        self.notify.notify_waiters();
        true
    }

    /// The peer sent `Fin`: no more data will arrive, readers drain what
    /// is buffered and then see end-of-stream.
    pub(crate) fn set_peer_closed(&self) {
        self.buf.lock().peer_closed = true;
        self.notify.notify_waiters();
    }

    pub(crate) fn peer_closed(&self) -> bool {
        self.buf.lock().peer_closed
    }

    /// Fail all pending and future reads and drop whatever is buffered.
    /// Returns the byte count that was still queued so the caller can
    /// recycle it as receive credit.
    pub(crate) fn kill(&self) -> usize {
        let reclaimed = {
            let mut buf = self.buf.lock();
            buf.dead = true;
            buf.chunks.clear();
            std::mem::take(&mut buf.buffered)
        };
        self.notify.notify_waiters();
        reclaimed
    }

    /// Mark the local half closed; returns the previous value.
    pub(crate) fn set_local_closed(&self) -> bool {
        self.local_closed.swap(true, Ordering::Relaxed)
    }

    pub(crate) fn is_local_closed(&self) -> bool {
        self.local_closed.load(Ordering::Relaxed)
    }
}

/// One multiplexed byte stream.
///
/// Reading drains the chunks the session's receive loop queued for this
/// stream and returns the consumed byte count to the session-wide receive
/// credit. Writing chunks the input into `Psh` frames and puts them on
/// the wire through the session, one frame at a time.
///
/// Dropping the handle without [`close`](Self::close) hands the stream to
/// the session's reaper, which sends the `Fin` and releases the entry.
pub struct MuxStream {
    state: Arc<StreamState>,
    session: Weak<SessionInner>,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl std::fmt::Debug for MuxStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxStream")
            .field("state", &*self.state)
            .finish_non_exhaustive()
    }
}

impl MuxStream {
    pub(crate) fn new(state: Arc<StreamState>, session: &Arc<SessionInner>) -> Self {
        Self {
            state,
            session: Arc::downgrade(session),
            read_deadline: None,
            write_deadline: None,
        }
    }

    /// Identifier of this stream inside its session.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.state.id
    }

    /// Bound every future [`read`](Self::read) by `deadline`. `None`
    /// removes the bound. A read already in flight keeps the deadline it
    /// started with.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline = deadline;
    }

    /// Bound every future [`write`](Self::write) by `deadline`. `None`
    /// removes the bound.
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.write_deadline = deadline;
    }

    /// Read at least one byte into `buf`, blocking until data arrives,
    /// the read deadline elapses, or the stream goes away. An empty `buf`
    /// reads zero bytes.
    ///
    /// # Errors
    /// [`Error::Eof`] once the peer has closed and the buffer is drained,
    /// [`Error::Timeout`] when the read deadline elapses, and
    /// [`Error::BrokenPipe`] when the stream or its session was closed on
    /// this side.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let mut notified = pin!(self.state.notify.notified());
            // Register before checking the buffer so a push landing in
            // between is not lost.
            notified.as_mut().enable();
            if let Some(n) = self.try_read(buf)? {
                return Ok(n);
            }
            timing::deadline_bound(self.read_deadline, notified).await?;
        }
    }

    fn try_read(&self, out: &mut [u8]) -> Result<Option<usize>> {
        let n = {
            let mut buf = self.state.buf.lock();
            if buf.dead || self.state.is_local_closed() {
                return Err(Error::BrokenPipe);
            }
            if buf.buffered == 0 {
                if buf.peer_closed {
                    return Err(Error::Eof);
                }
                return Ok(None);
            }
            let mut n = 0;
            while n < out.len() {
                let Some(chunk) = buf.chunks.front_mut() else {
                    break;
                };
                let take = chunk.len().min(out.len() - n);
                out[n..n + take].copy_from_slice(&chunk[..take]);
                chunk.advance(take);
                if chunk.is_empty() {
                    buf.chunks.pop_front();
                }
                n += take;
            }
            buf.buffered -= n;
            n
        };
        if let Some(session) = self.session.upgrade() {
            session.return_tokens(n);
        }
        trace!(id = self.state.id, n, "stream read");
        Ok(Some(n))
    }

    /// Write all of `buf` as a sequence of `Psh` frames of at most the
    /// session's `max_frame_size` bytes each, in order.
    ///
    /// # Errors
    /// [`Error::Timeout`] when the write deadline elapses before a chunk
    /// is fully on the wire, [`Error::BrokenPipe`] when the stream or
    /// session is closed. Chunks already written stay written.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.state.is_local_closed() {
            return Err(Error::BrokenPipe);
        }
        let session = self.session.upgrade().ok_or(Error::BrokenPipe)?;
        let mut written = 0;
        for chunk in buf.chunks(session.config.max_frame_size) {
            session
                .write_frame(
                    Frame {
                        cmd: Cmd::Psh,
                        stream_id: self.state.id,
                        payload: chunk,
                    },
                    self.write_deadline,
                )
                .await?;
            written += chunk.len();
        }
        trace!(id = self.state.id, written, "stream write");
        Ok(written)
    }

    /// Send `Fin` and close the stream. Buffered unread data is discarded
    /// and its credit returned to the session.
    ///
    /// # Errors
    /// [`Error::BrokenPipe`] when already closed; write errors from the
    /// `Fin` frame itself.
    pub async fn close(&mut self) -> Result<()> {
        let session = self.session.upgrade().ok_or(Error::BrokenPipe)?;
        session
            .close_stream_local(&self.state, self.write_deadline)
            .await
    }
}

impl Drop for MuxStream {
    fn drop(&mut self) {
        if self.state.is_local_closed() {
            return;
        }
        if let Some(session) = self.session.upgrade() {
            trace!(id = self.state.id, "stream dropped without close");
            session.notify_dropped(self.state.id);
        }
    }
}
