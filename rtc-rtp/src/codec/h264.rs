//! H.264 (RFC 6184) packetiser/depacketiser: single-NAL packets below the
//! MTU, FU-A fragmentation above it. STAP-A aggregation is intentionally
//! not produced on send — one NAL per RTP packet, fragmented or not.
use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Packetizer, RTP_MAX_PAYLOAD};

const ANNEXB_START_CODE: &[u8] = &[0, 0, 0, 1];
const FU_HEADER_SIZE: usize = 2;
const NALU_TYPE_MASK: u8 = 0x1F;
const FU_A_NAL_TYPE: u8 = 28;

/// Splits an Annex-B access unit into its constituent NAL units (start
/// codes stripped), recognising both the 3-byte (`00 00 01`) and 4-byte
/// (`00 00 00 01`) start code forms.
pub fn split_annex_b_nals(data: &[u8]) -> Vec<&[u8]> {
    let mut markers: Vec<(usize, usize)> = Vec::new(); // (marker_start, nal_data_start)
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let marker_start = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
            markers.push((marker_start, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }
    let mut nals = Vec::with_capacity(markers.len());
    for (idx, &(_marker_start, nal_start)) in markers.iter().enumerate() {
        let nal_end = markers
            .get(idx + 1)
            .map(|&(ms, _)| ms)
            .unwrap_or(data.len());
        if nal_start <= nal_end {
            nals.push(&data[nal_start..nal_end]);
        }
    }
    nals
}

/// Packetises one Annex-B access unit. The caller is responsible for
/// setting the RTP marker bit on the last payload returned.
#[derive(Debug, Default)]
pub struct H264Packetizer;

impl Packetizer for H264Packetizer {
    fn packetize(&mut self, sample: &[u8], _samples: u32) -> Result<Vec<Bytes>> {
        if sample.is_empty() {
            return Ok(Vec::new());
        }
        let mut payloads = Vec::new();
        for nal in split_annex_b_nals(sample) {
            if nal.is_empty() {
                continue;
            }
            if nal.len() <= RTP_MAX_PAYLOAD {
                payloads.push(Bytes::copy_from_slice(nal));
                continue;
            }

            let nal_header = nal[0];
            let nal_type = nal_header & NALU_TYPE_MASK;
            let fu_indicator = (nal_header & 0xE0) | FU_A_NAL_TYPE;
            let body = &nal[1..];
            let chunk_size = RTP_MAX_PAYLOAD - FU_HEADER_SIZE;

            let mut offset = 0;
            while offset < body.len() {
                let end = (offset + chunk_size).min(body.len());
                let start = offset == 0;
                let last = end == body.len();

                let mut fu_header = nal_type;
                if start {
                    fu_header |= 1 << 7;
                }
                if last {
                    fu_header |= 1 << 6;
                }

                let mut buf = BytesMut::with_capacity(FU_HEADER_SIZE + (end - offset));
                buf.extend_from_slice(&[fu_indicator, fu_header]);
                buf.extend_from_slice(&body[offset..end]);
                payloads.push(buf.freeze());

                offset = end;
            }
        }
        Ok(payloads)
    }
}

/// Reassembles H.264 RTP payloads into Annex-B NAL units (start code
/// prepended to each), matching the convention `rtc-media`'s `H26xWriter`
/// expects: no further start-code insertion is needed by the caller.
#[derive(Debug, Default)]
pub struct H264Packet {
    fua_buffer: Option<BytesMut>,
}

impl Depacketizer for H264Packet {
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        let nal_type = payload[0] & NALU_TYPE_MASK;

        if nal_type == FU_A_NAL_TYPE {
            if payload.len() < FU_HEADER_SIZE {
                self.fua_buffer = None;
                return Err(Error::TooShort);
            }
            let fu_indicator = payload[0];
            let fu_header = payload[1];
            let start = fu_header & 0x80 != 0;
            let end = fu_header & 0x40 != 0;
            let original_nal_type = fu_header & NALU_TYPE_MASK;

            if start {
                let mut buf = BytesMut::new();
                buf.extend_from_slice(ANNEXB_START_CODE);
                buf.extend_from_slice(&[(fu_indicator & 0xE0) | original_nal_type]);
                buf.extend_from_slice(&payload[FU_HEADER_SIZE..]);
                self.fua_buffer = Some(buf);
            } else if let Some(buf) = self.fua_buffer.as_mut() {
                buf.extend_from_slice(&payload[FU_HEADER_SIZE..]);
            } else {
                // No start fragment seen yet: drop this orphan fragment.
                return Ok(Bytes::new());
            }

            if end {
                if let Some(buf) = self.fua_buffer.take() {
                    return Ok(buf.freeze());
                }
            }
            Ok(Bytes::new())
        } else {
            // A full single-NAL packet always terminates any fragment in
            // progress, even a malformed one.
            self.fua_buffer = None;
            let mut buf = BytesMut::with_capacity(ANNEXB_START_CODE.len() + payload.len());
            buf.extend_from_slice(ANNEXB_START_CODE);
            buf.extend_from_slice(payload);
            Ok(buf.freeze())
        }
    }

    fn is_partition_head(&self, payload: &Bytes) -> bool {
        if payload.is_empty() {
            return false;
        }
        let nal_type = payload[0] & NALU_TYPE_MASK;
        if nal_type == FU_A_NAL_TYPE {
            payload.len() > 1 && payload[1] & 0x80 != 0
        } else {
            true
        }
    }

    fn is_partition_tail(&self, marker: bool, _payload: &Bytes) -> bool {
        marker
    }
}
