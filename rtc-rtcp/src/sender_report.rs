//! Sender Report (SR, PT=200): RFC 3550 §6.4.1.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::{padding_size, Header, PacketType, HEADER_LENGTH};
use crate::reception_report::{ReceptionReport, RECEPTION_REPORT_LENGTH};

const SR_BODY_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_time: u64,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub reports: Vec<ReceptionReport>,
    pub profile_extensions: Bytes,
}

impl SenderReport {
    fn raw_size(&self) -> usize {
        HEADER_LENGTH
            + SR_BODY_LENGTH
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
            packet_type: PacketType::SenderReport,
            length: (self.marshal_size() / 4 - 1) as u16,
        };
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&header.marshal()?);
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_time);
        buf.put_u32(self.rtp_time);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);
        for report in &self.reports {
            buf.extend_from_slice(&report.marshal()?);
        }
        buf.extend_from_slice(&self.profile_extensions);
        buf.resize(self.marshal_size(), 0);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH + SR_BODY_LENGTH {
            return Err(Error::TooShort);
        }
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PacketType::SenderReport {
            return Err(Error::InvalidHeader);
        }
        let ssrc = buf.get_u32();
        let ntp_time = buf.get_u64();
        let rtp_time = buf.get_u32();
        let packet_count = buf.get_u32();
        let octet_count = buf.get_u32();

        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            reports.push(ReceptionReport::unmarshal(buf)?);
        }
        let profile_extensions = buf.copy_to_bytes(buf.remaining());

        Ok(SenderReport {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
            reports,
            profile_extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sender_report_with_reports() {
        let sr = SenderReport {
            ssrc: 0x902f_9e2e,
            ntp_time: 0xda8b_d1fc_dddd_a05a,
            rtp_time: 0xaaf4_edd5,
            packet_count: 1000,
            octet_count: 50000,
            reports: vec![ReceptionReport {
                ssrc: 0xbc5e_9a40,
                fraction_lost: 10,
                total_lost: 100,
                last_sequence_number: 0x46e1,
                jitter: 273,
                last_sender_report: 0x9f3_6432,
                delay: 150137,
            }],
            profile_extensions: Bytes::new(),
        };
        let mut buf = sr.marshal().unwrap();
        assert_eq!(SenderReport::unmarshal(&mut buf).unwrap(), sr);
    }

    #[test]
    fn round_trips_empty_sender_report() {
        let sr = SenderReport {
            ssrc: 1,
            ..Default::default()
        };
        let mut buf = sr.marshal().unwrap();
        assert_eq!(SenderReport::unmarshal(&mut buf).unwrap(), sr);
    }
}
