//! VP8 (RFC 7741) packetiser/depacketiser using the minimal one-byte
//! payload descriptor: start-of-partition bit only, no picture ID/TL0PICIDX
//! extensions.
use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Packetizer, RTP_MAX_PAYLOAD};

const DESCRIPTOR_SIZE: usize = 1;
const START_OF_PARTITION: u8 = 0x10;

#[derive(Debug, Default)]
pub struct Vp8Packetizer;

impl Packetizer for Vp8Packetizer {
    fn packetize(&mut self, sample: &[u8], _samples: u32) -> Result<Vec<Bytes>> {
        if sample.is_empty() {
            return Ok(Vec::new());
        }
        let chunk_size = RTP_MAX_PAYLOAD - DESCRIPTOR_SIZE;
        let mut payloads = Vec::new();
        let mut offset = 0;
        while offset < sample.len() {
            let end = (offset + chunk_size).min(sample.len());
            let descriptor = if offset == 0 { START_OF_PARTITION } else { 0x00 };

            let mut buf = BytesMut::with_capacity(DESCRIPTOR_SIZE + (end - offset));
            buf.extend_from_slice(&[descriptor]);
            buf.extend_from_slice(&sample[offset..end]);
            payloads.push(buf.freeze());

            offset = end;
        }
        Ok(payloads)
    }
}

/// Reassembles a VP8 frame from its fragments. A fragment stream that does
/// not begin with the start-of-partition bit (frame in progress has not
/// started) is rejected rather than silently accumulated.
#[derive(Debug, Default)]
pub struct Vp8Packet {
    frame: Option<BytesMut>,
}

impl Depacketizer for Vp8Packet {
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        let descriptor = payload[0];
        let starts_partition = descriptor & START_OF_PARTITION != 0;

        if self.frame.is_none() {
            if !starts_partition {
                return Err(Error::TooShort);
            }
            self.frame = Some(BytesMut::new());
        }

        if let Some(frame) = self.frame.as_mut() {
            frame.extend_from_slice(&payload[DESCRIPTOR_SIZE..]);
        }

        Ok(Bytes::new())
    }

    fn is_partition_head(&self, payload: &Bytes) -> bool {
        !payload.is_empty() && payload[0] & START_OF_PARTITION != 0
    }

    fn is_partition_tail(&self, marker: bool, _payload: &Bytes) -> bool {
        marker
    }
}

impl Vp8Packet {
    /// Takes the accumulated frame once the caller has observed the RTP
    /// marker bit on the final fragment.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        self.frame.take().map(BytesMut::freeze)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fragment_sets_start_bit() {
        let mut packetizer = Vp8Packetizer;
        let payloads = packetizer.packetize(&[1, 2, 3], 0).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0][0], START_OF_PARTITION);
    }

    #[test]
    fn large_frame_fragments_with_start_only_on_first() {
        let sample = vec![7u8; 3000];
        let mut packetizer = Vp8Packetizer;
        let payloads = packetizer.packetize(&sample, 0).unwrap();
        assert!(payloads.len() > 1);
        assert_eq!(payloads[0][0], START_OF_PARTITION);
        for p in &payloads[1..] {
            assert_eq!(p[0], 0x00);
        }
    }

    #[test]
    fn reassembles_fragmented_frame() {
        let sample = vec![9u8; 3000];
        let mut packetizer = Vp8Packetizer;
        let payloads = packetizer.packetize(&sample, 0).unwrap();

        let mut depacketizer = Vp8Packet::default();
        for p in &payloads {
            depacketizer.depacketize(p).unwrap();
        }
        let frame = depacketizer.take_frame().unwrap();
        assert_eq!(&frame[..], &sample[..]);
    }

    #[test]
    fn rejects_fragment_without_leading_start_bit() {
        let mut depacketizer = Vp8Packet::default();
        let payload = Bytes::copy_from_slice(&[0x00, 1, 2, 3]);
        assert!(depacketizer.depacketize(&payload).is_err());
    }
}
