//! Goodbye (BYE, PT=203): RFC 3550 §6.6 — a list of sources leaving the
//! session plus an optional human-readable reason.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::{padding_size, Header, PacketType, HEADER_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    pub reason: Bytes,
}

impl Goodbye {
    fn raw_size(&self) -> usize {
        let reason_field = if self.reason.is_empty() {
            0
        } else {
            1 + self.reason.len()
        };
        HEADER_LENGTH + self.sources.len() * 4 + reason_field
    }

    pub fn marshal_size(&self) -> usize {
        self.raw_size() + padding_size(self.raw_size())
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if self.sources.len() > crate::header::COUNT_MAX as usize {
            return Err(Error::TooManyReports);
        }
        if self.reason.len() > u8::MAX as usize {
            return Err(Error::ReasonTooLong);
        }
        let header = Header {
            padding: padding_size(self.raw_size()) != 0,
            count: self.sources.len() as u8,
            packet_type: PacketType::Goodbye,
            length: (self.marshal_size() / 4 - 1) as u16,
        };
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&header.marshal()?);
        for source in &self.sources {
            buf.put_u32(*source);
        }
        if !self.reason.is_empty() {
            buf.put_u8(self.reason.len() as u8);
            buf.extend_from_slice(&self.reason);
        }
        buf.resize(self.marshal_size(), 0);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH {
            return Err(Error::TooShort);
        }
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PacketType::Goodbye {
            return Err(Error::InvalidHeader);
        }
        let mut sources = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if buf.remaining() < 4 {
                return Err(Error::TooShort);
            }
            sources.push(buf.get_u32());
        }
        let reason = if buf.has_remaining() {
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                return Err(Error::TooShort);
            }
            buf.copy_to_bytes(len)
        } else {
            Bytes::new()
        };
        Ok(Goodbye { sources, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_goodbye_with_reason() {
        let gb = Goodbye {
            sources: vec![0x902f_9e2e, 0xbc5e_9a40, 0x1234_5678],
            reason: Bytes::from_static(b"Session ended"),
        };
        let mut buf = gb.marshal().unwrap();
        assert_eq!(Goodbye::unmarshal(&mut buf).unwrap(), gb);
    }

    #[test]
    fn round_trips_goodbye_without_reason() {
        let gb = Goodbye {
            sources: vec![1],
            reason: Bytes::new(),
        };
        let mut buf = gb.marshal().unwrap();
        assert_eq!(Goodbye::unmarshal(&mut buf).unwrap(), gb);
    }
}
