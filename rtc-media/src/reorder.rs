//! Bounded sequence-number reorder window. The emission contract — a
//! subsequence of the insertion order, permuted only within the window
//! size and the drop-timeout — mirrors the ordering guarantee
//! `rtp::sequence::is_jump` checks for on the send side.
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Forward distance from `from` to `to` in sequence-number space, treating
/// the 16-bit counter as wrapping.
fn forward_distance(from: u16, to: u16) -> u16 {
    to.wrapping_sub(from)
}

pub struct ReorderBuffer<T> {
    drop_timeout: Duration,
    next_expected: Option<u16>,
    entries: HashMap<u16, (Instant, T)>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(drop_timeout: Duration) -> Self {
        ReorderBuffer {
            drop_timeout,
            next_expected: None,
            entries: HashMap::new(),
        }
    }

    /// Inserts `item` at `seq`, then drains whatever is now
    /// in-order. Duplicate sequence numbers are dropped (the caller logs).
    pub fn insert(&mut self, seq: u16, item: T) -> Vec<T> {
        if self.next_expected.is_none() {
            self.next_expected = Some(seq);
        }
        if self.entries.contains_key(&seq) {
            return Vec::new();
        }
        self.entries.insert(seq, (Instant::now(), item));
        self.drain(false)
    }

    /// Forces the head to emit if it has aged past the drop timeout, even
    /// though the in-order predecessor never arrived. Call periodically
    /// (e.g. from the RTCP report timer) so a buffer with no further
    /// inserts still progresses.
    pub fn poll_timeouts(&mut self) -> Vec<T> {
        self.drain(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn oldest_seq(&self) -> Option<u16> {
        let expected = self.next_expected?;
        self.entries
            .keys()
            .copied()
            .min_by_key(|&seq| forward_distance(expected, seq))
    }

    fn drain(&mut self, force_timeout: bool) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            let Some(expected) = self.next_expected else {
                break;
            };
            if let Some((_, item)) = self.entries.remove(&expected) {
                out.push(item);
                self.next_expected = Some(expected.wrapping_add(1));
                continue;
            }
            if force_timeout {
                if let Some(head) = self.oldest_seq() {
                    let aged = self.entries[&head].0.elapsed() >= self.drop_timeout;
                    if aged {
                        let (_, item) = self.entries.remove(&head).unwrap();
                        out.push(item);
                        self.next_expected = Some(head.wrapping_add(1));
                        continue;
                    }
                }
            }
            break;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_inserts_drain_in_sequence() {
        let mut buf: ReorderBuffer<u16> = ReorderBuffer::new(Duration::from_millis(100));
        assert_eq!(buf.insert(1, 1), vec![1]);
        assert_eq!(buf.insert(3, 3), Vec::<u16>::new());
        assert_eq!(buf.insert(2, 2), vec![2, 3]);
        assert_eq!(buf.insert(4, 4), vec![4]);
    }

    #[test]
    fn duplicate_sequence_is_dropped() {
        let mut buf: ReorderBuffer<u16> = ReorderBuffer::new(Duration::from_millis(100));
        buf.insert(1, 1);
        buf.insert(2, 20);
        assert_eq!(buf.insert(2, 99), Vec::<u16>::new());
        assert_eq!(buf.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn head_timeout_forces_emission_out_of_order() {
        let mut buf: ReorderBuffer<u16> = ReorderBuffer::new(Duration::from_millis(150));
        assert_eq!(buf.insert(1, 1), vec![1]);
        assert_eq!(buf.insert(3, 3), Vec::<u16>::new());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(buf.poll_timeouts(), vec![3]);
    }
}
