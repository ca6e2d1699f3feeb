//! A compound RTCP packet: one or more individual packets concatenated in
//! a single UDP datagram, the first of which must be a sender or receiver
//! report (RFC 3550 §6.1).
use bytes::{Buf, Bytes};
use shared::error::{Error, Result};

use crate::goodbye::Goodbye;
use crate::header::{Header, PacketType};
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;
use crate::source_description::SourceDescription;
use crate::transport_feedbacks::transport_layer_feedback::TransportLayerFeedback;

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Goodbye(Goodbye),
    TransportLayerFeedback(TransportLayerFeedback),
}

impl Packet {
    /// SSRCs this packet concerns, used by [`crate::session::RtcpSession`] to
    /// route an incoming compound packet's pieces to the right track.
    pub fn destination_ssrc(&self) -> Vec<u32> {
        match self {
            Packet::SenderReport(sr) => {
                let mut out: Vec<u32> = sr.reports.iter().map(|r| r.ssrc).collect();
                out.push(sr.ssrc);
                out
            }
            Packet::ReceiverReport(rr) => {
                let mut out: Vec<u32> = rr.reports.iter().map(|r| r.ssrc).collect();
                out.push(rr.ssrc);
                out
            }
            Packet::SourceDescription(sdes) => sdes.chunks.iter().map(|c| c.source).collect(),
            Packet::Goodbye(gb) => gb.sources.clone(),
            Packet::TransportLayerFeedback(feedback) => vec![feedback.media_ssrc],
        }
    }
}

/// Splits and decodes a compound RTCP datagram into its individual packets.
pub fn unmarshal_compound(raw: &Bytes) -> Result<Vec<Packet>> {
    if raw.is_empty() {
        return Err(Error::EmptyCompound);
    }
    let mut packets = Vec::new();
    let mut cursor = raw.clone();
    let mut first = true;

    while cursor.has_remaining() {
        let mut peek = cursor.clone();
        let header = Header::unmarshal(&mut peek)?;
        let packet_len = (header.length as usize + 1) * 4;
        if packet_len > cursor.remaining() {
            return Err(Error::TooShort);
        }
        let mut body = cursor.copy_to_bytes(packet_len);

        if first && !matches!(
            header.packet_type,
            PacketType::SenderReport | PacketType::ReceiverReport
        ) {
            return Err(Error::BadFirstPacket);
        }
        first = false;

        let packet = match header.packet_type {
            PacketType::SenderReport => Packet::SenderReport(SenderReport::unmarshal(&mut body)?),
            PacketType::ReceiverReport => {
                Packet::ReceiverReport(ReceiverReport::unmarshal(&mut body)?)
            }
            PacketType::SourceDescription => {
                Packet::SourceDescription(SourceDescription::unmarshal(&mut body)?)
            }
            PacketType::Goodbye => Packet::Goodbye(Goodbye::unmarshal(&mut body)?),
            PacketType::TransportSpecificFeedback => {
                Packet::TransportLayerFeedback(TransportLayerFeedback::unmarshal(&mut body)?)
            }
            _ => continue,
        };
        packets.push(packet);
    }

    if packets.is_empty() {
        return Err(Error::EmptyCompound);
    }
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn decodes_sr_followed_by_sdes() {
        let sr = SenderReport {
            ssrc: 1,
            ..Default::default()
        };
        let sdes = SourceDescription { chunks: vec![] };

        let mut raw = BytesMut::new();
        raw.extend_from_slice(&sr.marshal().unwrap());
        raw.extend_from_slice(&sdes.marshal().unwrap());

        let packets = unmarshal_compound(&raw.freeze()).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], Packet::SenderReport(_)));
        assert!(matches!(packets[1], Packet::SourceDescription(_)));
    }

    #[test]
    fn rejects_compound_not_starting_with_sr_or_rr() {
        let gb = Goodbye {
            sources: vec![1],
            reason: Bytes::new(),
        };
        let raw = gb.marshal().unwrap();
        assert_eq!(unmarshal_compound(&raw), Err(Error::BadFirstPacket));
    }

    #[test]
    fn rejects_empty_compound() {
        assert_eq!(unmarshal_compound(&Bytes::new()), Err(Error::EmptyCompound));
    }
}
