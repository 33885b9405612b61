//! Many independent logical byte streams over one reliable, ordered
//! transport.
//!
//! A [`Session`] runs on top of anything implementing `AsyncRead +
//! AsyncWrite` (a TCP connection, a TLS stream, an in-memory duplex) and
//! multiplexes it into [`MuxStream`]s. Frames carry an 8-byte header and at
//! most 64 KiB of payload; receive-side backpressure is a single
//! session-wide byte bucket; dead peers are detected with a `Nop`
//! keepalive; every blocking operation honors a deadline.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later
#![warn(missing_docs, missing_debug_implementations)]
#![forbid(unsafe_code)]

mod config;
mod credit;
mod dupe;
mod frame;
mod session;
mod stream;
mod timed_mutex;
mod timing;

pub use config::Config;
pub use credit::Credit;
pub use dupe::Dupe;
pub use frame::{Cmd, Frame, Header, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
pub use session::Session;
pub use stream::MuxStream;
pub use timing::OptionalDuration;

use std::sync::Arc;
use thiserror::Error as ThisError;

/// Errors the multiplexer can produce.
#[derive(Debug, Clone, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// The session or stream was already closed.
    #[error("broken pipe")]
    BrokenPipe,
    /// The stream id space is exhausted; no new stream can be opened on
    /// this session.
    #[error("stream id space exhausted")]
    GoAway,
    /// The peer speaks a different protocol version.
    #[error("invalid protocol version: {0}")]
    InvalidProtocol(u8),
    /// The peer sent a command byte this protocol does not define.
    #[error("invalid command: {0}")]
    InvalidCommand(u8),
    /// An outbound payload exceeds what a single frame can carry.
    #[error("payload exceeds the maximum frame size")]
    PayloadTooLarge,
    /// A deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,
    /// The peer closed its half of the stream and the receive buffer is
    /// drained.
    #[error("end of stream")]
    Eof,
    /// A credit waiter was stuck past the safety bound.
    #[error("credit wait exceeded the global timeout")]
    GlobalTimeout,
    /// The transport failed.
    #[error("transport: {0}")]
    Io(Arc<std::io::Error>),
    /// The configuration cannot be honored.
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
