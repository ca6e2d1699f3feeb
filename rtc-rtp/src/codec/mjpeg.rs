//! Motion-JPEG (RFC 2435), simplified to carrying an opaque already-encoded
//! JPEG scan without restart markers or quantisation-table signalling: each
//! RTP payload is an 8-byte header carrying the fragment's byte offset into
//! the frame, followed by the fragment bytes. The offset lets a receiver
//! detect a dropped fragment even though this implementation does not
//! itself retransmit.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Packetizer, RTP_MAX_PAYLOAD};

const JPEG_HEADER_SIZE: usize = 8;

#[derive(Debug, Default)]
pub struct MjpegPacketizer;

impl Packetizer for MjpegPacketizer {
    fn packetize(&mut self, sample: &[u8], _samples: u32) -> Result<Vec<Bytes>> {
        if sample.is_empty() {
            return Ok(Vec::new());
        }
        let chunk_size = RTP_MAX_PAYLOAD - JPEG_HEADER_SIZE;
        let mut payloads = Vec::new();
        let mut offset = 0usize;
        while offset < sample.len() {
            let end = (offset + chunk_size).min(sample.len());

            let mut buf = BytesMut::with_capacity(JPEG_HEADER_SIZE + (end - offset));
            buf.put_u8(0); // type-specific
            buf.extend_from_slice(&(offset as u32).to_be_bytes()[1..4]); // 24-bit fragment offset
            buf.put_u8(1); // type: baseline JPEG
            buf.put_u8(255); // q: quant tables signalled out of band
            buf.put_u16(0); // width/height placeholder in 8-pixel units
            buf.extend_from_slice(&sample[offset..end]);
            payloads.push(buf.freeze());

            offset = end;
        }
        Ok(payloads)
    }
}

/// Reassembles JPEG scan data from its offset-tagged fragments. A gap
/// between the incoming offset and the bytes already collected means a
/// fragment was lost; the in-progress frame is discarded rather than
/// stitched incorrectly.
#[derive(Debug, Default)]
pub struct MjpegPacket {
    frame: Option<BytesMut>,
}

impl Depacketizer for MjpegPacket {
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes> {
        if payload.len() < JPEG_HEADER_SIZE {
            return Err(Error::TooShort);
        }
        let mut header = &payload[..JPEG_HEADER_SIZE];
        let _type_specific = header.get_u8();
        let offset = {
            let b0 = header.get_u8() as u32;
            let b1 = header.get_u8() as u32;
            let b2 = header.get_u8() as u32;
            (b0 << 16) | (b1 << 8) | b2
        } as usize;

        let frame = self.frame.get_or_insert_with(BytesMut::new);
        if offset != frame.len() {
            self.frame = None;
            return Err(Error::TooShort);
        }
        frame.extend_from_slice(&payload[JPEG_HEADER_SIZE..]);
        Ok(Bytes::new())
    }

    fn is_partition_head(&self, payload: &Bytes) -> bool {
        payload.len() >= JPEG_HEADER_SIZE && payload[1] == 0 && payload[2] == 0 && payload[3] == 0
    }

    fn is_partition_tail(&self, marker: bool, _payload: &Bytes) -> bool {
        marker
    }
}

impl MjpegPacket {
    pub fn take_frame(&mut self) -> Option<Bytes> {
        self.frame.take().map(BytesMut::freeze)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fragment_has_zero_offset() {
        let mut packetizer = MjpegPacketizer;
        let payloads = packetizer.packetize(&[1, 2, 3], 0).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][1..4], &[0, 0, 0]);
    }

    #[test]
    fn large_frame_has_incrementing_offsets() {
        let sample = vec![0xAAu8; 3000];
        let mut packetizer = MjpegPacketizer;
        let payloads = packetizer.packetize(&sample, 0).unwrap();
        assert!(payloads.len() > 1);

        let mut expected_offset = 0u32;
        for p in &payloads {
            let offset = ((p[1] as u32) << 16) | ((p[2] as u32) << 8) | p[3] as u32;
            assert_eq!(offset, expected_offset);
            expected_offset += (p.len() - JPEG_HEADER_SIZE) as u32;
        }
    }

    #[test]
    fn reassembles_fragmented_scan() {
        let sample = vec![0x5Cu8; 3000];
        let mut packetizer = MjpegPacketizer;
        let payloads = packetizer.packetize(&sample, 0).unwrap();

        let mut depacketizer = MjpegPacket::default();
        for p in &payloads {
            depacketizer.depacketize(p).unwrap();
        }
        assert_eq!(&depacketizer.take_frame().unwrap()[..], &sample[..]);
    }

    #[test]
    fn dropped_fragment_resets_frame_in_progress() {
        let sample = vec![0x11u8; 3000];
        let mut packetizer = MjpegPacketizer;
        let payloads = packetizer.packetize(&sample, 0).unwrap();

        let mut depacketizer = MjpegPacket::default();
        depacketizer.depacketize(&payloads[0]).unwrap();
        assert!(depacketizer.depacketize(payloads.last().unwrap()).is_err());
        assert!(depacketizer.take_frame().is_none());
    }
}
