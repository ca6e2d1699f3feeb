//! A single reception-report block, embedded (zero or more times) in both
//! [`crate::sender_report::SenderReport`] and
//! [`crate::receiver_report::ReceiverReport`] (RFC 3550 §6.4.1/§6.4.2).
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

pub const RECEPTION_REPORT_LENGTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub total_lost: u32,
    pub last_sequence_number: u32,
    pub jitter: u32,
    pub last_sender_report: u32,
    pub delay: u32,
}

impl ReceptionReport {
    pub fn marshal(&self) -> Result<Bytes> {
        if self.total_lost > 0x00FF_FFFF {
            return Err(Error::InvalidTotalLost);
        }
        let mut buf = BytesMut::with_capacity(RECEPTION_REPORT_LENGTH);
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.extend_from_slice(&self.total_lost.to_be_bytes()[1..4]);
        buf.put_u32(self.last_sequence_number);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sender_report);
        buf.put_u32(self.delay);
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < RECEPTION_REPORT_LENGTH {
            return Err(Error::TooShort);
        }
        let ssrc = buf.get_u32();
        let fraction_lost = buf.get_u8();
        let total_lost = u32::from_be_bytes([0, buf.get_u8(), buf.get_u8(), buf.get_u8()]);
        let last_sequence_number = buf.get_u32();
        let jitter = buf.get_u32();
        let last_sender_report = buf.get_u32();
        let delay = buf.get_u32();
        Ok(ReceptionReport {
            ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number,
            jitter,
            last_sender_report,
            delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_reception_report() {
        let rr = ReceptionReport {
            ssrc: 0xbc5e_9a40,
            fraction_lost: 10,
            total_lost: 100,
            last_sequence_number: 0x46e1,
            jitter: 273,
            last_sender_report: 0x9f3_6432,
            delay: 150137,
        };
        let mut buf = rr.marshal().unwrap();
        assert_eq!(ReceptionReport::unmarshal(&mut buf).unwrap(), rr);
    }

    #[test]
    fn total_lost_above_24_bits_is_rejected() {
        let rr = ReceptionReport {
            total_lost: 0x0100_0000,
            ..Default::default()
        };
        assert!(rr.marshal().is_err());
    }
}
