//! The session: owning container of streams over one transport.
//!
//! A session splits its transport in two. The read half is owned by the
//! receive loop task; the write half sits behind a deadline-bounded mutex
//! so that exactly one whole frame is on the wire at a time. Three more
//! tasks run next to the receive loop: the keepalive sender, the
//! keepalive watchdog, and the reaper that finishes streams whose handle
//! was dropped without a close.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::config::Config;
use crate::credit::Credit;
use crate::dupe::Dupe;
use crate::frame::{Cmd, Frame, Header, HEADER_SIZE};
use crate::stream::{MuxStream, StreamState};
use crate::timed_mutex::TimedMutex;
use crate::timing::{self, OptionalInterval};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Streams the peer opened that the application has not accepted yet.
/// When the backlog is full the receive loop blocks rather than dropping
/// the `Syn`.
const ACCEPT_BACKLOG: usize = 1024;

/// One multiplexed connection over a single transport, carrying many
/// [`MuxStream`]s.
///
/// Dropping the handle tears the session down; [`Session::close`] does
/// the same but reports whether this caller performed the teardown.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("streams", &self.inner.streams.lock().len())
            .field("bucket", &self.inner.bucket.value())
            .field("closed", &self.inner.is_closed())
            .finish_non_exhaustive()
    }
}

/// Notifications for the reaper task.
enum Dropped {
    /// A `MuxStream` handle went away without `close`.
    Stream(u32),
    /// The `Session` handle itself went away.
    Session,
}

pub(crate) struct SessionInner {
    pub(crate) config: Config,
    /// Write half. The lock serializes whole frames on the wire.
    writer: TimedMutex<Box<dyn AsyncWrite + Send + Unpin>>,
    /// All live streams. One lock for lookup and modification.
    streams: Mutex<HashMap<u32, Arc<StreamState>>>,
    ids: Mutex<IdAlloc>,
    /// Receive-side credit in bytes, shared by every stream.
    bucket: Credit,
    accept_tx: mpsc::Sender<MuxStream>,
    accept_rx: tokio::sync::Mutex<mpsc::Receiver<MuxStream>>,
    accept_deadline: Mutex<Option<Instant>>,
    /// Closed latch; `die` broadcasts its flip.
    closed: AtomicBool,
    die: Notify,
    /// Whether any frame arrived since the watchdog last looked.
    data_was_read: AtomicBool,
    dropped_tx: mpsc::UnboundedSender<Dropped>,
}

struct IdAlloc {
    next: u32,
    go_away: bool,
}

impl Session {
    /// Run a session over `transport`. Client and server differ only in
    /// the stream-id space they allocate from, so exactly one end must be
    /// the client.
    ///
    /// # Errors
    /// [`Error::Config`] when the configuration cannot be honored.
    ///
    /// # Panics
    /// When called outside a tokio runtime: the session spawns its
    /// receive, keepalive, watchdog, and reaper tasks right here.
    pub fn new<T>(transport: T, config: Config, is_client: bool) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let (read_half, write_half) = tokio::io::split(transport);
        let (accept_tx, accept_rx) = mpsc::channel(ACCEPT_BACKLOG);
        let (dropped_tx, dropped_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            bucket: Credit::new(config.max_receive_buffer as i32),
            writer: TimedMutex::new(Box::new(write_half) as Box<dyn AsyncWrite + Send + Unpin>),
            streams: Mutex::new(HashMap::new()),
            ids: Mutex::new(IdAlloc {
                next: u32::from(is_client),
                go_away: false,
            }),
            accept_tx,
            accept_rx: tokio::sync::Mutex::new(accept_rx),
            accept_deadline: Mutex::new(None),
            closed: AtomicBool::new(false),
            die: Notify::new(),
            data_was_read: AtomicBool::new(false),
            dropped_tx,
            config,
        });
        tokio::spawn(recv_loop(inner.dupe(), read_half));
        tokio::spawn(keepalive_loop(inner.dupe()));
        tokio::spawn(watchdog_loop(inner.dupe()));
        tokio::spawn(reaper_loop(inner.dupe(), dropped_rx));
        Ok(Self { inner })
    }

    /// A client session: it allocates odd stream ids.
    ///
    /// # Errors
    /// See [`Session::new`].
    pub fn client<T>(transport: T, config: Config) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::new(transport, config, true)
    }

    /// A server session: it allocates even stream ids.
    ///
    /// # Errors
    /// See [`Session::new`].
    pub fn server<T>(transport: T, config: Config) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::new(transport, config, false)
    }

    /// Open a new outgoing stream: allocate an id, put the `Syn` on the
    /// wire under the configured write timeout, and hand the stream out.
    ///
    /// # Errors
    /// [`Error::BrokenPipe`] when the session is closed, [`Error::GoAway`]
    /// when the id space is exhausted, and write errors from the `Syn`
    /// frame itself.
    pub async fn open_stream(&self) -> Result<MuxStream> {
        self.inner.open_stream().await
    }

    /// Wait for the next stream the peer opened.
    ///
    /// # Errors
    /// [`Error::Timeout`] when the accept deadline elapses and
    /// [`Error::BrokenPipe`] when the session is closed.
    pub async fn accept_stream(&self) -> Result<MuxStream> {
        self.inner.accept_stream().await
    }

    /// Bound every future [`accept_stream`](Self::accept_stream) by
    /// `deadline`; `None` removes the bound. An accept already in flight
    /// keeps the deadline it started with.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        *self.inner.accept_deadline.lock() = deadline;
    }

    /// Number of live streams; zero once the session is closed.
    #[must_use]
    pub fn num_streams(&self) -> usize {
        if self.inner.is_closed() {
            0
        } else {
            self.inner.streams.lock().len()
        }
    }

    /// Whether the session has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Tear the session down: fail every pending operation with
    /// [`Error::BrokenPipe`], drop all streams, and close the transport.
    ///
    /// # Errors
    /// [`Error::BrokenPipe`] when another caller already closed it; only
    /// the caller that actually performed the teardown gets `Ok`.
    pub async fn close(&self) -> Result<()> {
        if self.inner.shutdown().await {
            Ok(())
        } else {
            Err(Error::BrokenPipe)
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The reaper runs the actual teardown; it still holds the inner.
        self.inner.dropped_tx.send(Dropped::Session).ok();
    }
}

impl SessionInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Completes once the session is torn down.
    async fn closed_wait(&self) {
        loop {
            let mut die = pin!(self.die.notified());
            die.as_mut().enable();
            if self.is_closed() {
                return;
            }
            die.await;
        }
    }

    /// What a failed operation on a closed session reports. The credit
    /// watchdog is the one cause that outlives the teardown; everything
    /// else is a plain broken pipe.
    fn death_error(&self) -> Error {
        match self.bucket.error() {
            Some(e @ Error::GlobalTimeout) => e,
            _ => Error::BrokenPipe,
        }
    }

    /// Give read credit back to the bucket, waking the receive loop.
    pub(crate) fn return_tokens(&self, n: usize) {
        if n > 0 {
            self.bucket.increment(n as i32);
        }
    }

    pub(crate) fn notify_dropped(&self, id: u32) {
        self.dropped_tx.send(Dropped::Stream(id)).ok();
    }

    /// First-closer-wins teardown. Returns whether this call did the
    /// work.
    async fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::Relaxed) {
            return false;
        }
        debug!("tearing session down");
        self.die.notify_waiters();
        self.bucket.set_error(Error::BrokenPipe);
        let states: Vec<Arc<StreamState>> = {
            let mut streams = self.streams.lock();
            streams.drain().map(|(_, state)| state).collect()
        };
        for state in states {
            state.set_local_closed();
            state.kill();
        }
        // Best effort: a writer still holding the lock will fail on its
        // own deadline and observe the closed flag.
        if let Some(mut writer) = self.writer.try_lock() {
            writer.shutdown().await.ok();
        }
        true
    }

    /// Tear down because of `reason`, which credit waiters see directly.
    async fn die_with(&self, reason: Error) {
        self.bucket.set_error(reason);
        self.shutdown().await;
    }

    fn alloc_stream_id(&self) -> Result<u32> {
        let mut ids = self.ids.lock();
        if ids.go_away {
            return Err(Error::GoAway);
        }
        let sid = ids.next;
        ids.next = sid.wrapping_add(2);
        // Wrapping back into already-used space would violate id
        // uniqueness; the id just handed out is still fine.
        if ids.next < sid {
            ids.go_away = true;
            warn!("stream id space exhausted");
        }
        Ok(sid)
    }

    /// Serialize one frame onto the wire.
    ///
    /// The effective deadline is the earlier of the caller's and the
    /// configured `write_timeout` from now; it covers the wait for the
    /// send lock and the transport write. A failure after the lock was
    /// acquired may leave a torn frame behind, so it kills the session:
    /// frames are whole or the session dies.
    pub(crate) async fn write_frame(
        &self,
        frame: Frame<'_>,
        deadline: Option<Instant>,
    ) -> Result<usize> {
        let buf = frame.encode()?;
        if self.is_closed() {
            return Err(self.death_error());
        }
        let deadline =
            timing::min_deadline(deadline, self.config.write_timeout.deadline_from_now());
        let mut writer = self.writer.lock_deadline(deadline).await?;
        if self.is_closed() {
            return Err(self.death_error());
        }
        let result = timing::deadline_bound(deadline, async {
            writer.write_all(&buf).await?;
            writer.flush().await
        })
        .await;
        drop(writer);
        match result {
            Ok(Ok(())) => {
                trace!(
                    cmd = ?frame.cmd,
                    id = frame.stream_id,
                    len = frame.payload.len(),
                    "frame sent"
                );
                Ok(frame.payload.len())
            }
            Ok(Err(e)) => {
                warn!("transport write failed: {e}");
                let e = Error::from(e);
                self.die_with(e.clone()).await;
                Err(e)
            }
            Err(e) => {
                warn!("frame write timed out mid-flight");
                self.die_with(Error::Timeout).await;
                Err(e)
            }
        }
    }

    async fn open_stream(self: &Arc<Self>) -> Result<MuxStream> {
        if self.is_closed() {
            return Err(self.death_error());
        }
        let sid = self.alloc_stream_id()?;
        let state = Arc::new(StreamState::new(sid));
        self.streams.lock().insert(sid, state.dupe());
        // Insert before the Syn so the peer's first answer frame always
        // finds the stream.
        match self.write_frame(Frame::new(Cmd::Syn, sid), None).await {
            Ok(_) => {
                debug!(sid, "stream opened");
                Ok(MuxStream::new(state, self))
            }
            Err(e) => {
                self.streams.lock().remove(&sid);
                Err(e)
            }
        }
    }

    async fn accept_stream(&self) -> Result<MuxStream> {
        if self.is_closed() {
            return Err(self.death_error());
        }
        let deadline = *self.accept_deadline.lock();
        tokio::select! {
            () = self.closed_wait() => Err(self.death_error()),
            r = timing::deadline_bound(deadline, async {
                self.accept_rx.lock().await.recv().await
            }) => match r? {
                Some(stream) => Ok(stream),
                None => Err(Error::BrokenPipe),
            },
        }
    }

    /// Local close: `Fin` once, fail further reads, recycle what was
    /// still buffered. The table entry goes away once both halves are
    /// closed.
    pub(crate) async fn close_stream_local(
        &self,
        state: &Arc<StreamState>,
        deadline: Option<Instant>,
    ) -> Result<()> {
        if state.set_local_closed() {
            return Err(Error::BrokenPipe);
        }
        self.return_tokens(state.kill());
        let fin = self.write_frame(Frame::new(Cmd::Fin, state.id), deadline).await;
        if state.peer_closed() {
            self.remove_stream(state.id);
        }
        fin.map(|_| ())
    }

    fn remove_stream(&self, id: u32) {
        let state = self.streams.lock().remove(&id);
        if let Some(state) = state {
            self.return_tokens(state.kill());
            debug!(id, "stream released");
        }
    }

    /// A `MuxStream` handle was dropped without a close: finish the
    /// close on its behalf.
    async fn reap_stream(&self, id: u32) {
        let state = self.streams.lock().remove(&id);
        let Some(state) = state else { return };
        self.return_tokens(state.kill());
        if !state.set_local_closed() {
            if let Err(e) = self.write_frame(Frame::new(Cmd::Fin, id), None).await {
                debug!(id, "fin for dropped stream failed: {e}");
            }
        }
        debug!(id, "stream reaped");
    }

    async fn handle_syn(self: &Arc<Self>, sid: u32) -> Result<()> {
        let stream = {
            let mut streams = self.streams.lock();
            if streams.contains_key(&sid) {
                debug!(sid, "syn for an existing stream, ignored");
                None
            } else {
                let state = Arc::new(StreamState::new(sid));
                streams.insert(sid, state.dupe());
                Some(MuxStream::new(state, self))
            }
        };
        let Some(stream) = stream else {
            return Ok(());
        };
        debug!(sid, "peer opened stream");
        // A full backlog blocks the whole receive loop until the
        // application drains accept_stream.
        tokio::select! {
            () = self.closed_wait() => Err(self.death_error()),
            r = self.accept_tx.send(stream) => r.map_err(|_| Error::BrokenPipe),
        }
    }

    fn handle_fin(&self, sid: u32) {
        let state = self.streams.lock().get(&sid).map(Dupe::dupe);
        let Some(state) = state else {
            trace!(sid, "fin for unknown stream");
            return;
        };
        debug!(sid, "peer closed stream");
        state.set_peer_closed();
        if state.is_local_closed() {
            self.remove_stream(sid);
        }
    }

    fn handle_psh(&self, sid: u32, payload: Bytes) {
        let len = payload.len();
        let state = self.streams.lock().get(&sid).map(Dupe::dupe);
        let Some(state) = state else {
            trace!(sid, len, "psh for unknown stream, discarded");
            return;
        };
        // Charge first; a push onto a dead stream refunds in full.
        self.bucket.consume(len as i32);
        if state.push(payload) {
            trace!(sid, len, "data queued");
        } else {
            self.bucket.increment(len as i32);
        }
    }
}

/// One transport read, bounded by the configured `read_timeout` and cut
/// short by session teardown.
async fn read_bounded<R>(inner: &SessionInner, transport: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let deadline = inner.config.read_timeout.deadline_from_now();
    tokio::select! {
        () = inner.closed_wait() => Err(inner.death_error()),
        r = timing::deadline_bound(deadline, transport.read_exact(buf)) => {
            r?.map(|_| ()).map_err(Error::from)
        }
    }
}

/// Parse frames off the transport and dispatch them until something
/// fatal happens, then tear the session down with that reason.
#[tracing::instrument(skip_all, level = "trace")]
async fn recv_loop<R>(inner: Arc<SessionInner>, mut transport: R)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let reason = loop {
        // Flow-control gate: no new frame while the bucket is spent.
        if let Err(e) = inner.bucket.wait_ready().await {
            break e;
        }
        let mut hdr = [0_u8; HEADER_SIZE];
        if let Err(e) = read_bounded(&inner, &mut transport, &mut hdr).await {
            break e;
        }
        let header = match Header::decode(hdr) {
            Ok(header) => header,
            Err(e) => break e,
        };
        inner.data_was_read.store(true, Ordering::Relaxed);
        trace!(cmd = ?header.cmd, id = header.stream_id, len = header.length, "frame received");
        // Drain the payload whatever the command, or the framing slips.
        let payload = if header.length > 0 {
            let mut payload = BytesMut::zeroed(usize::from(header.length));
            if let Err(e) = read_bounded(&inner, &mut transport, &mut payload).await {
                break e;
            }
            payload.freeze()
        } else {
            Bytes::new()
        };
        match header.cmd {
            Cmd::Nop => {}
            Cmd::Syn => {
                if let Err(e) = inner.handle_syn(header.stream_id).await {
                    break e;
                }
            }
            Cmd::Fin => inner.handle_fin(header.stream_id),
            Cmd::Psh => inner.handle_psh(header.stream_id, payload),
        }
    };
    debug!("receive loop ended: {reason}");
    inner.die_with(reason).await;
}

/// Emit a `Nop` every keepalive interval so the peer's watchdog stays
/// fed, then nudge the receive gate.
#[tracing::instrument(skip_all, level = "trace")]
async fn keepalive_loop(inner: Arc<SessionInner>) {
    let mut interval = OptionalInterval::after(inner.config.keepalive_interval);
    loop {
        tokio::select! {
            () = inner.closed_wait() => break,
            _ = interval.tick() => {
                trace!("sending keepalive");
                if let Err(e) = inner.write_frame(Frame::new(Cmd::Nop, 0), None).await {
                    debug!("keepalive failed: {e}");
                }
                // A receive loop parked on an empty bucket re-checks the
                // error latch when poked.
                inner.bucket.poke();
            }
        }
    }
}

/// Close the session when a whole watchdog period passes without a
/// single inbound frame.
#[tracing::instrument(skip_all, level = "trace")]
async fn watchdog_loop(inner: Arc<SessionInner>) {
    let mut interval = OptionalInterval::after(inner.config.keepalive_timeout);
    loop {
        tokio::select! {
            () = inner.closed_wait() => break,
            _ = interval.tick() => {
                if !inner.data_was_read.swap(false, Ordering::Relaxed) {
                    warn!("peer sent nothing within the keepalive window");
                    inner.die_with(Error::BrokenPipe).await;
                    break;
                }
            }
        }
    }
}

/// Finish streams whose handle was dropped without `close`, and tear the
/// session down once its own handle goes away.
#[tracing::instrument(skip_all, level = "trace")]
async fn reaper_loop(inner: Arc<SessionInner>, mut dropped_rx: mpsc::UnboundedReceiver<Dropped>) {
    loop {
        tokio::select! {
            () = inner.closed_wait() => break,
            msg = dropped_rx.recv() => match msg {
                Some(Dropped::Stream(id)) => inner.reap_stream(id).await,
                Some(Dropped::Session) | None => break,
            },
        }
    }
    inner.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::OptionalDuration;
    use std::time::Duration;

    fn quiet_config() -> Config {
        Config {
            keepalive_interval: OptionalDuration::NONE,
            keepalive_timeout: OptionalDuration::NONE,
            ..Config::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn client_ids_odd_server_ids_even() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let client = Session::client(a, quiet_config()).unwrap();
        let server = Session::server(b, quiet_config()).unwrap();
        let c1 = client.open_stream().await.unwrap();
        let c2 = client.open_stream().await.unwrap();
        let s1 = server.open_stream().await.unwrap();
        let s2 = server.open_stream().await.unwrap();
        assert_eq!((c1.id(), c2.id()), (1, 3));
        assert_eq!((s1.id(), s2.id()), (0, 2));
        // the peers see them under the same ids
        assert_eq!(server.accept_stream().await.unwrap().id(), 1);
        assert_eq!(client.accept_stream().await.unwrap().id(), 0);
    }

    #[tokio::test]
    async fn id_wraparound_latches_go_away() {
        let (a, _b) = tokio::io::duplex(1 << 16);
        let session = Session::client(a, quiet_config()).unwrap();
        session.inner.ids.lock().next = u32::MAX;
        let stream = session.open_stream().await.unwrap();
        assert_eq!(stream.id(), u32::MAX);
        assert!(matches!(session.open_stream().await, Err(Error::GoAway)));
        assert!(matches!(session.open_stream().await, Err(Error::GoAway)));
        // the session itself stays up
        assert!(!session.is_closed());
        assert_eq!(session.num_streams(), 1);
    }

    #[tokio::test]
    async fn bucket_gates_the_receive_loop() {
        let config = Config {
            max_frame_size: 4,
            max_receive_buffer: 4,
            ..quiet_config()
        };
        let (a, mut peer) = tokio::io::duplex(1 << 16);
        let session = Session::server(a, config).unwrap();
        for frame in [
            Frame::new(Cmd::Syn, 1),
            Frame {
                cmd: Cmd::Psh,
                stream_id: 1,
                payload: b"aaaa",
            },
            Frame {
                cmd: Cmd::Psh,
                stream_id: 1,
                payload: b"bbbb",
            },
        ] {
            peer.write_all(&frame.encode().unwrap()).await.unwrap();
        }
        let mut stream = session.accept_stream().await.unwrap();
        settle().await;
        // the first push spent the whole bucket; the second frame must
        // still be sitting in the transport
        assert_eq!(session.inner.bucket.value(), 0);
        let mut buf = [0_u8; 4];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"aaaa");
        settle().await;
        // reading refilled the bucket, the loop charged it again
        assert_eq!(session.inner.bucket.value(), 0);
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"bbbb");
        settle().await;
        assert_eq!(session.inner.bucket.value(), 4);
    }

    #[tokio::test]
    async fn stream_close_recycles_unread_credit() {
        let config = Config {
            max_frame_size: 4,
            max_receive_buffer: 8,
            ..quiet_config()
        };
        let (a, mut peer) = tokio::io::duplex(1 << 16);
        let session = Session::server(a, config).unwrap();
        peer.write_all(&Frame::new(Cmd::Syn, 1).encode().unwrap())
            .await
            .unwrap();
        peer.write_all(
            &Frame {
                cmd: Cmd::Psh,
                stream_id: 1,
                payload: b"aaaa",
            }
            .encode()
            .unwrap(),
        )
        .await
        .unwrap();
        let mut stream = session.accept_stream().await.unwrap();
        settle().await;
        assert_eq!(session.inner.bucket.value(), 4);
        stream.close().await.unwrap();
        assert_eq!(session.inner.bucket.value(), 8);
        assert!(matches!(stream.close().await, Err(Error::BrokenPipe)));
        // reads on the closed stream fail rather than block
        let mut buf = [0_u8; 4];
        assert!(matches!(
            stream.read(&mut buf).await,
            Err(Error::BrokenPipe)
        ));
    }

    #[tokio::test]
    async fn fin_then_local_close_releases_the_stream() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let client = Session::client(a, quiet_config()).unwrap();
        let server = Session::server(b, quiet_config()).unwrap();
        let mut tx = client.open_stream().await.unwrap();
        let mut rx = server.accept_stream().await.unwrap();
        assert_eq!(client.num_streams(), 1);
        assert_eq!(server.num_streams(), 1);
        tx.close().await.unwrap();
        let mut buf = [0_u8; 1];
        assert!(matches!(rx.read(&mut buf).await, Err(Error::Eof)));
        rx.close().await.unwrap();
        settle().await;
        assert_eq!(client.num_streams(), 0);
        assert_eq!(server.num_streams(), 0);
    }

    #[tokio::test]
    async fn dropped_stream_is_reaped_with_a_fin() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let client = Session::client(a, quiet_config()).unwrap();
        let server = Session::server(b, quiet_config()).unwrap();
        let tx = client.open_stream().await.unwrap();
        let mut rx = server.accept_stream().await.unwrap();
        drop(tx);
        // the reaper's Fin must reach the peer as end-of-stream
        let mut buf = [0_u8; 1];
        assert!(matches!(rx.read(&mut buf).await, Err(Error::Eof)));
        settle().await;
        assert_eq!(client.num_streams(), 0);
    }
}
