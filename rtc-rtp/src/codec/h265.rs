//! H.265/HEVC (RFC 7798) packetiser/depacketiser: single NAL-unit packets,
//! aggregation packets (AP, type 48) and fragmentation units (FU, type 49).
//! The `H265Payload` shape below matches what `rtc-media`'s `H26xWriter`
//! pattern-matches on: a single NAL unit, an aggregation packet exposing
//! its first and remaining units, or a fragmentation unit exposing its
//! header bits plus fragment payload. Reassembly of a fragmented NAL across
//! multiple FU packets is the writer's job, not this module's: each call to
//! `depacketize` decodes exactly the one RTP payload it is given.
use bytes::{BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::packetizer::{Depacketizer, Packetizer, RTP_MAX_PAYLOAD};

const NAL_HEADER_SIZE: usize = 2;
const FU_HEADER_SIZE: usize = 1;
const AP_TYPE: u8 = 48;
const FU_TYPE: u8 = 49;

fn nal_type(header: u16) -> u8 {
    ((header >> 9) & 0x3F) as u8
}

fn nal_header_bytes(t: u8, layer_id: u8, tid: u8) -> [u8; 2] {
    let hi = ((t & 0x3F) << 1) | ((layer_id >> 5) & 0x1);
    let lo = ((layer_id & 0x1F) << 3) | (tid & 0x7);
    [hi, lo]
}

/// An RTP-aggregation-packet sub-unit: one NAL unit with its own 16-bit
/// length prefix inside the AP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationUnit {
    nal_unit: Bytes,
}

impl AggregationUnit {
    pub fn nal_unit(&self) -> &Bytes {
        &self.nal_unit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct H265PaciPacket {
    payload: Bytes,
}

impl H265PaciPacket {
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct H265SingleNalUnitPacket {
    payload: Bytes,
}

impl H265SingleNalUnitPacket {
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct H265AggregationPacket {
    first_unit: Option<AggregationUnit>,
    other_units: Vec<AggregationUnit>,
}

impl H265AggregationPacket {
    pub fn first_unit(&self) -> Option<&AggregationUnit> {
        self.first_unit.as_ref()
    }

    pub fn other_units(&self) -> &[AggregationUnit] {
        &self.other_units
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FuHeader(u8);

impl FuHeader {
    pub fn s(&self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn e(&self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn fu_type(&self) -> u8 {
        self.0 & 0x3F
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct H265FragmentationUnitPacket {
    fu_header: FuHeader,
    payload: Bytes,
}

impl H265FragmentationUnitPacket {
    pub fn fu_header(&self) -> FuHeader {
        self.fu_header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H265Payload {
    H265PACIPacket(H265PaciPacket),
    H265SingleNALUnitPacket(H265SingleNalUnitPacket),
    H265AggregationPacket(H265AggregationPacket),
    H265FragmentationUnitPacket(H265FragmentationUnitPacket),
}

fn fragment_large_nal(nal: &[u8]) -> Vec<Bytes> {
    let header = u16::from_be_bytes([nal[0], nal[1]]);
    let t = nal_type(header);
    let layer_id = (((nal[0] & 0x1) << 5) | (nal[1] >> 3)) & 0x3F;
    let tid = nal[1] & 0x7;

    let body = &nal[NAL_HEADER_SIZE..];
    let chunk_size = RTP_MAX_PAYLOAD - NAL_HEADER_SIZE - FU_HEADER_SIZE;
    let mut payloads = Vec::new();
    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + chunk_size).min(body.len());
        let start = offset == 0;
        let last = end == body.len();

        let mut fu_header = t & 0x3F;
        if start {
            fu_header |= 0x80;
        }
        if last {
            fu_header |= 0x40;
        }

        let mut buf = BytesMut::with_capacity(NAL_HEADER_SIZE + FU_HEADER_SIZE + (end - offset));
        buf.extend_from_slice(&nal_header_bytes(FU_TYPE, layer_id, tid));
        buf.put_u8(fu_header);
        buf.extend_from_slice(&body[offset..end]);
        payloads.push(buf.freeze());

        offset = end;
    }
    payloads
}

/// Packs every NAL currently held in `pending` into one AP (type 48)
/// packet, or re-emits it unwrapped when only one NAL is pending — an AP
/// of one unit carries no benefit over a single-NAL packet.
fn flush_aggregation(pending: &mut Vec<&[u8]>, size: &mut usize, payloads: &mut Vec<Bytes>) {
    match pending.len() {
        0 => {}
        1 => payloads.push(Bytes::copy_from_slice(pending[0])),
        _ => {
            let first = pending[0];
            let layer_id = (((first[0] & 0x1) << 5) | (first[1] >> 3)) & 0x3F;
            let tid = first[1] & 0x7;
            let mut buf = BytesMut::with_capacity(*size);
            buf.extend_from_slice(&nal_header_bytes(AP_TYPE, layer_id, tid));
            for unit in pending.iter() {
                buf.extend_from_slice(&(unit.len() as u16).to_be_bytes());
                buf.extend_from_slice(unit);
            }
            payloads.push(buf.freeze());
        }
    }
    pending.clear();
    *size = NAL_HEADER_SIZE;
}

/// Packetises an Annex-B access unit (possibly several NAL units). A NAL
/// above the MTU is FU-fragmented; runs of two or more NALs that each fit
/// under the MTU are combined into one AP (type 48) packet instead of one
/// RTP packet per NAL, mirroring what [`H265Packet`] already knows how to
/// decode.
#[derive(Debug, Default)]
pub struct H265Packetizer;

impl Packetizer for H265Packetizer {
    fn packetize(&mut self, sample: &[u8], _samples: u32) -> Result<Vec<Bytes>> {
        if sample.is_empty() {
            return Ok(Vec::new());
        }
        let mut payloads = Vec::new();
        let mut pending: Vec<&[u8]> = Vec::new();
        let mut pending_size = NAL_HEADER_SIZE;

        for nal in crate::codec::h264::split_annex_b_nals(sample) {
            if nal.len() < NAL_HEADER_SIZE {
                continue;
            }
            if nal.len() > RTP_MAX_PAYLOAD {
                flush_aggregation(&mut pending, &mut pending_size, &mut payloads);
                payloads.extend(fragment_large_nal(nal));
                continue;
            }
            let unit_cost = 2 + nal.len();
            if !pending.is_empty() && pending_size + unit_cost > RTP_MAX_PAYLOAD {
                flush_aggregation(&mut pending, &mut pending_size, &mut payloads);
            }
            pending.push(nal);
            pending_size += unit_cost;
        }
        flush_aggregation(&mut pending, &mut pending_size, &mut payloads);
        Ok(payloads)
    }
}

/// Decodes one RTP payload into its structured [`H265Payload`]. Stateless
/// across calls: FU reassembly happens at the consumer, which inspects
/// `fu_header().s()/.e()` to know when to start/flush its own buffer.
#[derive(Debug, Default)]
pub struct H265Packet {
    payload: Option<H265Payload>,
}

impl H265Packet {
    pub fn payload(&self) -> Option<&H265Payload> {
        self.payload.as_ref()
    }
}

impl Depacketizer for H265Packet {
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes> {
        if payload.len() < NAL_HEADER_SIZE {
            return Err(Error::TooShort);
        }
        let header = u16::from_be_bytes([payload[0], payload[1]]);
        let t = nal_type(header);

        let decoded = match t {
            AP_TYPE => {
                let mut units = Vec::new();
                let mut offset = NAL_HEADER_SIZE;
                while offset + 2 <= payload.len() {
                    let len = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                    offset += 2;
                    if offset + len > payload.len() {
                        break;
                    }
                    units.push(AggregationUnit {
                        nal_unit: payload.slice(offset..offset + len),
                    });
                    offset += len;
                }
                if units.is_empty() {
                    return Err(Error::TooShort);
                }
                let first_unit = Some(units.remove(0));
                H265Payload::H265AggregationPacket(H265AggregationPacket {
                    first_unit,
                    other_units: units,
                })
            }
            FU_TYPE => {
                if payload.len() < NAL_HEADER_SIZE + FU_HEADER_SIZE {
                    return Err(Error::TooShort);
                }
                let fu_header = FuHeader(payload[NAL_HEADER_SIZE]);
                let frag = payload.slice(NAL_HEADER_SIZE + FU_HEADER_SIZE..);
                H265Payload::H265FragmentationUnitPacket(H265FragmentationUnitPacket {
                    fu_header,
                    payload: frag,
                })
            }
            50 => H265Payload::H265PACIPacket(H265PaciPacket {
                payload: payload.slice(NAL_HEADER_SIZE..),
            }),
            _ => H265Payload::H265SingleNALUnitPacket(H265SingleNalUnitPacket {
                payload: payload.clone(),
            }),
        };

        let out = match &decoded {
            H265Payload::H265SingleNALUnitPacket(p) => p.payload.clone(),
            H265Payload::H265FragmentationUnitPacket(p) => p.payload.clone(),
            H265Payload::H265AggregationPacket(p) => p
                .first_unit
                .as_ref()
                .map(|u| u.nal_unit.clone())
                .unwrap_or_default(),
            H265Payload::H265PACIPacket(p) => p.payload.clone(),
        };
        self.payload = Some(decoded);
        Ok(out)
    }

    fn is_partition_head(&self, payload: &Bytes) -> bool {
        if payload.len() < NAL_HEADER_SIZE {
            return false;
        }
        let header = u16::from_be_bytes([payload[0], payload[1]]);
        let t = nal_type(header);
        if t == FU_TYPE {
            payload.len() > NAL_HEADER_SIZE && payload[NAL_HEADER_SIZE] & 0x80 != 0
        } else {
            true
        }
    }

    fn is_partition_tail(&self, marker: bool, _payload: &Bytes) -> bool {
        marker
    }
}
