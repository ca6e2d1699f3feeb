//! Generic RTCP Transport-Layer Feedback container (PT=205, RFC 4585
//! §6.2): header, sender/media SSRC pair, and an opaque Feedback Control
//! Information blob. No feedback is generated or interpreted here — this
//! type exists so a TWCC payload (or any other FMT-specific FCI) can be
//! carried on the wire without this crate decoding its contents.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::{Header, PacketType, HEADER_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportLayerFeedback {
    /// RFC 4585 FMT subtype (1 = generic NACK, 15 = transport-wide CC,
    /// ...); carried verbatim, never interpreted.
    pub fmt: u8,
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub fci: Bytes,
}

impl TransportLayerFeedback {
    pub fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 8 + self.fci.len()
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if self.fci.len() % 4 != 0 {
            return Err(Error::WrongMarshalSize);
        }
        let header = Header {
            padding: false,
            count: self.fmt,
            packet_type: PacketType::TransportSpecificFeedback,
            length: (self.marshal_size() / 4 - 1) as u16,
        };
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&header.marshal()?);
        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        buf.extend_from_slice(&self.fci);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH + 8 {
            return Err(Error::TooShort);
        }
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PacketType::TransportSpecificFeedback {
            return Err(Error::InvalidHeader);
        }
        if buf.remaining() < 8 {
            return Err(Error::TooShort);
        }
        let sender_ssrc = buf.get_u32();
        let media_ssrc = buf.get_u32();
        let fci = buf.copy_to_bytes(buf.remaining());
        Ok(TransportLayerFeedback {
            fmt: header.count,
            sender_ssrc,
            media_ssrc,
            fci,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_opaque_fci_payload() {
        let feedback = TransportLayerFeedback {
            fmt: 15,
            sender_ssrc: 0x902f_9e2e,
            media_ssrc: 0xbc5e_9a40,
            fci: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let mut buf = feedback.marshal().unwrap();
        assert_eq!(TransportLayerFeedback::unmarshal(&mut buf).unwrap(), feedback);
    }

    #[test]
    fn empty_fci_round_trips() {
        let feedback = TransportLayerFeedback {
            fmt: 1,
            sender_ssrc: 1,
            media_ssrc: 2,
            fci: Bytes::new(),
        };
        let mut buf = feedback.marshal().unwrap();
        assert_eq!(TransportLayerFeedback::unmarshal(&mut buf).unwrap(), feedback);
    }

    #[test]
    fn odd_length_fci_is_rejected() {
        let feedback = TransportLayerFeedback {
            fmt: 1,
            sender_ssrc: 1,
            media_ssrc: 2,
            fci: Bytes::from_static(&[1, 2, 3]),
        };
        assert_eq!(feedback.marshal(), Err(Error::WrongMarshalSize));
    }
}
