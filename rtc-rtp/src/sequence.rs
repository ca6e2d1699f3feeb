use std::sync::atomic::{AtomicU16, Ordering};

/// Allocates RTP sequence numbers for one local track.
///
/// Increment is a compare-and-swap loop rather than a plain `fetch_add` so
/// that concurrent senders on the same track (e.g. RTP interleaved with a
/// DTMF sender) still produce a gap-free, strictly increasing (mod 2^16)
/// sequence, matching `webrtc-rs-webrtc`'s `should_fire_pli` retry idiom
/// applied here to sequence numbers instead of a rate-limit clock.
#[derive(Debug)]
pub struct SequenceNumber(AtomicU16);

impl SequenceNumber {
    pub fn new(initial: u16) -> Self {
        SequenceNumber(AtomicU16::new(initial))
    }

    /// Returns the next sequence number and advances the counter.
    pub fn next(&self) -> u16 {
        loop {
            let current = self.0.load(Ordering::Acquire);
            let next = current.wrapping_add(1);
            if self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return current;
            }
        }
    }

    pub fn current(&self) -> u16 {
        self.0.load(Ordering::Acquire)
    }
}

/// True when `next` is the RTP wraparound successor of `prev`
/// (`0xFFFF` -> `0x0000`), which must not be logged as a sequence jump.
pub fn is_wrap_around(prev: u16, next: u16) -> bool {
    prev == 0xFFFF && next == 0x0000
}

/// True when `next` is not the immediate successor of `prev` and is not the
/// benign wraparound case.
pub fn is_jump(prev: u16, next: u16) -> bool {
    !is_wrap_around(prev, next) && next != prev.wrapping_add(1)
}
