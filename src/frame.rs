//! Frame layout and the header codec.
//!
//! Every frame is an 8-byte little-endian header followed by up to
//! [`MAX_PAYLOAD_SIZE`] payload bytes:
//!
//! ```text
//! | ver: u8 | cmd: u8 | length: u16 | stream_id: u32 | payload ... |
//! ```
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    /// Open a stream.
    Syn = 0,
    /// Close a stream half.
    Fin = 1,
    /// Push data on a stream.
    Psh = 2,
    /// Keepalive.
    Nop = 3,
}

impl TryFrom<u8> for Cmd {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Syn),
            1 => Ok(Self::Fin),
            2 => Ok(Self::Psh),
            3 => Ok(Self::Nop),
            other => Err(Error::InvalidCommand(other)),
        }
    }
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Frame command.
    pub cmd: Cmd,
    /// Payload length in bytes.
    pub length: u16,
    /// Stream the frame belongs to.
    pub stream_id: u32,
}

impl Header {
    /// Parse the fixed 8-byte header.
    ///
    /// # Errors
    /// [`Error::InvalidProtocol`] on a version mismatch and
    /// [`Error::InvalidCommand`] on an unknown command byte; the session
    /// treats both as fatal.
    pub fn decode(buf: [u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0] != PROTOCOL_VERSION {
            return Err(Error::InvalidProtocol(buf[0]));
        }
        Ok(Self {
            cmd: Cmd::try_from(buf[1])?,
            length: u16::from_le_bytes([buf[2], buf[3]]),
            stream_id: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// An outbound frame. The payload is borrowed; [`Frame::encode`] produces
/// the single contiguous buffer that goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'data> {
    /// Frame command.
    pub cmd: Cmd,
    /// Stream the frame belongs to.
    pub stream_id: u32,
    /// Payload, at most [`MAX_PAYLOAD_SIZE`] bytes.
    pub payload: &'data [u8],
}

impl Frame<'static> {
    /// A payload-less frame.
    #[must_use]
    pub const fn new(cmd: Cmd, stream_id: u32) -> Self {
        Self {
            cmd,
            stream_id,
            payload: &[],
        }
    }
}

impl Frame<'_> {
    /// Serialize header and payload into one contiguous buffer, so the
    /// session can put the whole frame on the wire with a single write.
    ///
    /// # Errors
    /// [`Error::PayloadTooLarge`] when the payload does not fit the
    /// 16-bit length field.
    pub fn encode(&self) -> Result<Bytes> {
        let len = u16::try_from(self.payload.len()).map_err(|_| Error::PayloadTooLarge)?;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.cmd as u8);
        buf.put_u16_le(len);
        buf.put_u32_le(self.stream_id);
        buf.put_slice(self.payload);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_wire_layout() {
        let frame = Frame {
            cmd: Cmd::Psh,
            stream_id: 0x0403_0201,
            payload: b"hello",
        };
        let bytes = frame.encode().unwrap();
        assert_eq!(
            &bytes[..],
            [1, 2, 5, 0, 0x01, 0x02, 0x03, 0x04, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn round_trip() {
        for (cmd, sid, payload) in [
            (Cmd::Syn, 1, &b""[..]),
            (Cmd::Fin, 42, b""),
            (Cmd::Psh, u32::MAX, b"some data"),
            (Cmd::Nop, 0, b""),
        ] {
            let bytes = Frame {
                cmd,
                stream_id: sid,
                payload,
            }
            .encode()
            .unwrap();
            let mut hdr = [0_u8; HEADER_SIZE];
            hdr.copy_from_slice(&bytes[..HEADER_SIZE]);
            let header = Header::decode(hdr).unwrap();
            assert_eq!(header.cmd, cmd);
            assert_eq!(header.stream_id, sid);
            assert_eq!(usize::from(header.length), payload.len());
            assert_eq!(&bytes[HEADER_SIZE..], payload);
        }
    }

    #[test]
    fn rejects_wrong_version() {
        let r = Header::decode([2, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(r, Err(Error::InvalidProtocol(2))));
        let r = Header::decode([0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(r, Err(Error::InvalidProtocol(0))));
    }

    #[test]
    fn rejects_unknown_command() {
        let r = Header::decode([1, 4, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(r, Err(Error::InvalidCommand(4))));
        let r = Header::decode([1, 0xff, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(r, Err(Error::InvalidCommand(0xff))));
    }

    #[test]
    fn rejects_oversized_payload() {
        let payload = vec![0_u8; MAX_PAYLOAD_SIZE + 1];
        let frame = Frame {
            cmd: Cmd::Psh,
            stream_id: 1,
            payload: &payload,
        };
        assert!(matches!(frame.encode(), Err(Error::PayloadTooLarge)));
        // exactly at the cap is fine
        let frame = Frame {
            cmd: Cmd::Psh,
            stream_id: 1,
            payload: &payload[..MAX_PAYLOAD_SIZE],
        };
        assert_eq!(frame.encode().unwrap().len(), HEADER_SIZE + MAX_PAYLOAD_SIZE);
    }
}
