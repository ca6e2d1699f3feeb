//! T.140 real-time text (RFC 4103): UTF-8 text fragmented to the MTU, with
//! the RTP marker bit set on the first packet sent after an idle gap rather
//! than on a fragment boundary (RFC 4103 §4: "redundant and non-redundant
//! transmissions ... the marker bit SHOULD be set to 1 ... after a period
//! of text transmission inactivity"). Any elapsed time at all since the
//! previous send counts as idle; there is no minimum gap.
use std::time::{Duration, Instant};

use bytes::Bytes;
use shared::error::Result;

use crate::packetizer::{Depacketizer, Packetizer, RTP_MAX_PAYLOAD};

/// Any gap strictly greater than this since the previous send is an idle
/// period. Zero, so the marker bit reflects real elapsed time rather than a
/// minimum threshold.
pub const IDLE_GAP: Duration = Duration::ZERO;

#[derive(Debug)]
pub struct T140Packetizer {
    last_send: Option<Instant>,
    marker_on_first: bool,
}

impl Default for T140Packetizer {
    fn default() -> Self {
        T140Packetizer {
            last_send: None,
            marker_on_first: true,
        }
    }
}

impl T140Packetizer {
    /// True when the marker bit belongs on the first payload of the last
    /// `packetize` call (idle-period resumption), false otherwise.
    pub fn marker_on_first(&self) -> bool {
        self.marker_on_first
    }
}

impl Packetizer for T140Packetizer {
    fn packetize(&mut self, sample: &[u8], _samples: u32) -> Result<Vec<Bytes>> {
        if sample.is_empty() {
            return Ok(Vec::new());
        }
        let now = Instant::now();
        self.marker_on_first = match self.last_send {
            Some(last) => now.duration_since(last) > IDLE_GAP,
            None => true,
        };
        self.last_send = Some(now);

        let mut payloads = Vec::new();
        let mut offset = 0;
        while offset < sample.len() {
            let end = (offset + RTP_MAX_PAYLOAD).min(sample.len());
            payloads.push(Bytes::copy_from_slice(&sample[offset..end]));
            offset = end;
        }
        Ok(payloads)
    }
}

/// T.140 has no framing of its own: each RTP payload is already a complete
/// (possibly empty, for keep-alive) chunk of UTF-8 text.
#[derive(Debug, Default)]
pub struct T140Packet;

impl Depacketizer for T140Packet {
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes> {
        Ok(payload.clone())
    }

    fn is_partition_head(&self, _payload: &Bytes) -> bool {
        true
    }

    fn is_partition_tail(&self, _marker: bool, _payload: &Bytes) -> bool {
        true
    }
}
