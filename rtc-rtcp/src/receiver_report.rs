//! Receiver Report (RR, PT=201): RFC 3550 §6.4.2 — a Sender Report without
//! the sender-info block, for participants that are not themselves senders.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::{padding_size, Header, PacketType, HEADER_LENGTH};
use crate::reception_report::{ReceptionReport, RECEPTION_REPORT_LENGTH};

const RR_BODY_LENGTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
    pub profile_extensions: Bytes,
}

impl ReceiverReport {
    fn raw_size(&self) -> usize {
        HEADER_LENGTH
            + RR_BODY_LENGTH
            + self.reports.len() * RECEPTION_REPORT_LENGTH
            + self.profile_extensions.len()
    }

    pub fn marshal_size(&self) -> usize {
        self.raw_size() + padding_size(self.raw_size())
    }

    pub fn marshal(&self) -> Result<Bytes> {
        let header = Header {
            padding: padding_size(self.raw_size()) != 0,
            count: self.reports.len() as u8,
            packet_type: PacketType::ReceiverReport,
            length: (self.marshal_size() / 4 - 1) as u16,
        };
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&header.marshal()?);
        buf.put_u32(self.ssrc);
        for report in &self.reports {
            buf.extend_from_slice(&report.marshal()?);
        }
        buf.extend_from_slice(&self.profile_extensions);
        buf.resize(self.marshal_size(), 0);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH + RR_BODY_LENGTH {
            return Err(Error::TooShort);
        }
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PacketType::ReceiverReport {
            return Err(Error::InvalidHeader);
        }
        let ssrc = buf.get_u32();
        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            reports.push(ReceptionReport::unmarshal(buf)?);
        }
        let profile_extensions = buf.copy_to_bytes(buf.remaining());
        Ok(ReceiverReport {
            ssrc,
            reports,
            profile_extensions,
        })
    }
}
