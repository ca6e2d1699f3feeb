use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::Header;

/// Trailing bytes an SRTP `protect` call may append for the authentication
/// tag. Senders must reserve this much slack after the plaintext payload.
pub const SRTP_MAX_PREFIX_LENGTH: usize = 148;

/// An RTP header plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    pub fn unmarshal(buf: &[u8]) -> Result<Packet> {
        let (mut header, mut offset) = Header::unmarshal(buf)?;
        let mut payload_end = buf.len();

        if header.padding {
            if offset < payload_end {
                let pad = buf[payload_end - 1] as usize;
                // Attack defence: only trust the padding count when it
                // cannot drive the payload length negative.
                if pad < payload_end - offset {
                    payload_end -= pad;
                } else {
                    header.padding = false;
                }
            } else {
                header.padding = false;
            }
        }
        if offset > payload_end {
            offset = payload_end;
        }

        Ok(Packet {
            header,
            payload: Bytes::copy_from_slice(&buf[offset..payload_end]),
        })
    }

    pub fn marshal_size(&self) -> usize {
        self.header.marshal_size() + self.payload.len()
    }

    pub fn marshal(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header.marshal()?);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Serializes with `extra` trailing zero bytes reserved, for SRTP
    /// protect-in-place calls that append an authentication tag.
    pub fn marshal_with_slack(&self, extra: usize) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.marshal_size() + extra);
        buf.extend_from_slice(&self.header.marshal()?);
        buf.extend_from_slice(&self.payload);
        buf.resize(buf.len() + extra, 0);
        Ok(buf)
    }
}

impl Default for Packet {
    fn default() -> Self {
        Packet {
            header: Header::default(),
            payload: Bytes::new(),
        }
    }
}

pub fn require_non_empty(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        Err(Error::EmptyPayload)
    } else {
        Ok(())
    }
}
