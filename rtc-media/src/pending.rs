//! Bridges the race between DTLS/SRTP handshake completion and early
//! media arrival: a bounded, oldest-drop FIFO that caches raw packets
//! until a security context is installed, then replays them through the
//! normal receive path under the owning stream's mutex.
use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;

use rtp::Header;

/// Maximum number of packets cached while a stream has no usable security
/// context.
pub const PENDING_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct PendingPackage {
    pub header: Header,
    pub local_port: u16,
    pub remote: SocketAddr,
    pub raw: Bytes,
}

/// A single `MediaStream` owns one queue, so unlike the originating
/// description this carries no back-reference to "which video stream" the
/// packet belongs to — that routing is already implicit in which stream's
/// queue holds the entry.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<PendingPackage>,
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue::default()
    }

    /// Appends `pkg`, dropping the oldest entry first if already at
    /// capacity.
    pub fn push(&mut self, pkg: PendingPackage) {
        if self.items.len() >= PENDING_QUEUE_CAPACITY {
            self.items.pop_front();
            log::warn!("pending queue full, dropping oldest cached packet");
        }
        self.items.push_back(pkg);
    }

    /// Atomically snapshots and clears the queue, returning every cached
    /// packet in arrival order for replay.
    pub fn drain(&mut self) -> Vec<PendingPackage> {
        std::mem::take(&mut self.items).into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtp::Header;

    fn package(n: u16) -> PendingPackage {
        PendingPackage {
            header: Header {
                sequence_number: n,
                ..zero_header()
            },
            local_port: 5004,
            remote: "127.0.0.1:5004".parse().unwrap(),
            raw: Bytes::new(),
        }
    }

    fn zero_header() -> Header {
        Header {
            version: 2,
            padding: false,
            marker: false,
            payload_type: 0,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrc: Vec::new(),
            extension_profile: 0,
            extension_payload: Bytes::new(),
        }
    }

    #[test]
    fn queue_never_exceeds_capacity_and_drops_oldest() {
        let mut queue = PendingQueue::new();
        for n in 0..40u16 {
            queue.push(package(n));
        }
        assert_eq!(queue.len(), PENDING_QUEUE_CAPACITY);
        let drained = queue.drain();
        assert_eq!(drained.first().unwrap().header.sequence_number, 8);
        assert_eq!(drained.last().unwrap().header.sequence_number, 39);
    }

    #[test]
    fn drain_empties_the_queue_exactly_once() {
        let mut queue = PendingQueue::new();
        queue.push(package(1));
        queue.push(package(2));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
