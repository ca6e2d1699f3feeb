use bytes::Bytes;
use shared::error::Result;

/// Maximum RTP payload size a packetiser will emit in one packet.
pub const RTP_MAX_PAYLOAD: usize = 1400;

/// Fragments one encoded media sample into zero or more RTP payloads.
///
/// Implementations never panic and never exceed [`RTP_MAX_PAYLOAD`] per
/// returned payload; an empty `sample` is a no-op (empty `Vec` result).
pub trait Packetizer {
    fn packetize(&mut self, sample: &[u8], samples: u32) -> Result<Vec<Bytes>>;
}

/// Reassembles RTP payloads for one codec back into complete media
/// samples/frames.
///
/// Implementations discard packets that violate the codec's framing
/// invariants (logged at warning level by the caller) rather than erroring
/// the whole stream; malformed input resets any in-progress reassembly
/// buffer instead of corrupting it.
pub trait Depacketizer {
    /// Consumes one RTP payload, returning the bytes it contributes to the
    /// current frame (possibly empty while a fragmented unit accumulates).
    fn depacketize(&mut self, payload: &Bytes) -> Result<Bytes>;

    /// True when `depacketize` produced a complete, emittable frame.
    fn is_partition_head(&self, payload: &Bytes) -> bool;

    /// True when this payload is this packetiser's tail fragment/marker.
    fn is_partition_tail(&self, marker: bool, payload: &Bytes) -> bool;
}
