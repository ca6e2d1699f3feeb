//! RTCP fixed header (RFC 3550 §6.4.1):
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|    RC   |      PT       |             length            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
use bytes::{Buf, BufMut};
use shared::error::{Error, Result};

pub const HEADER_LENGTH: usize = 4;
pub const VERSION: u8 = 2;
/// Reception/source count field is 5 bits wide.
pub const COUNT_MAX: u8 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    SenderReport,
    ReceiverReport,
    SourceDescription,
    Goodbye,
    ApplicationDefined,
    TransportSpecificFeedback,
    PayloadSpecificFeedback,
    Unsupported(u8),
}

impl PacketType {
    fn from_u8(v: u8) -> Self {
        match v {
            200 => PacketType::SenderReport,
            201 => PacketType::ReceiverReport,
            202 => PacketType::SourceDescription,
            203 => PacketType::Goodbye,
            204 => PacketType::ApplicationDefined,
            205 => PacketType::TransportSpecificFeedback,
            206 => PacketType::PayloadSpecificFeedback,
            other => PacketType::Unsupported(other),
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            PacketType::SenderReport => 200,
            PacketType::ReceiverReport => 201,
            PacketType::SourceDescription => 202,
            PacketType::Goodbye => 203,
            PacketType::ApplicationDefined => 204,
            PacketType::TransportSpecificFeedback => 205,
            PacketType::PayloadSpecificFeedback => 206,
            PacketType::Unsupported(v) => v,
        }
    }
}

/// `count` doubles as the reception-report count (SR/RR) or the SSRC/CSRC
/// count (SDES/BYE); callers interpret it per packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub padding: bool,
    pub count: u8,
    pub packet_type: PacketType,
    /// Packet length in 32-bit words minus one, as it appears on the wire.
    pub length: u16,
}

impl Header {
    pub fn marshal(&self) -> Result<bytes::Bytes> {
        if self.count > COUNT_MAX {
            return Err(Error::TooManyReports);
        }
        let mut buf = bytes::BytesMut::with_capacity(HEADER_LENGTH);
        let mut b0 = (VERSION << 6) | self.count;
        if self.padding {
            b0 |= 1 << 5;
        }
        buf.put_u8(b0);
        buf.put_u8(self.packet_type.to_u8());
        buf.put_u16(self.length);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH {
            return Err(Error::TooShort);
        }
        let b0 = buf.get_u8();
        let padding = b0 & 0x20 != 0;
        let count = b0 & 0x1F;
        let packet_type = PacketType::from_u8(buf.get_u8());
        let length = buf.get_u16();
        Ok(Header {
            padding,
            count,
            packet_type,
            length,
        })
    }
}

/// Padding bytes needed to round `len` up to a 32-bit boundary.
pub fn padding_size(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sender_report_header() {
        let h = Header {
            padding: false,
            count: 1,
            packet_type: PacketType::SenderReport,
            length: 7,
        };
        let mut buf = h.marshal().unwrap();
        assert_eq!(Header::unmarshal(&mut buf).unwrap(), h);
    }

    #[test]
    fn too_many_reports_is_rejected() {
        let h = Header {
            padding: false,
            count: 32,
            packet_type: PacketType::ReceiverReport,
            length: 0,
        };
        assert!(h.marshal().is_err());
    }

    #[test]
    fn padding_size_rounds_to_word_boundary() {
        assert_eq!(padding_size(24), 0);
        assert_eq!(padding_size(25), 3);
        assert_eq!(padding_size(26), 2);
    }
}
