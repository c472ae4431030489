//! FIFO (First-In-First-Out) replacement policy.
//!
//! Frames are ordered by the moment they last became evictable, i.e. the
//! moment their pin count dropped to 0. Pinning a frame again takes it out
//! of the order; the next unpin puts it back at the tail.

use std::collections::{HashMap, VecDeque};

use super::Replacer;
use crate::common::FrameId;

/// Stale entries tolerated in the queue before it is compacted.
const COMPACT_SLACK: usize = 32;

/// FIFO eviction by time-of-unpin.
///
/// Re-pinning does not search the queue. Instead each entry carries the
/// stamp it was queued with, and [`evict`](Replacer::evict) skips entries
/// whose frame has since been pinned (or pinned and unpinned again, which
/// gives it a newer stamp further back).
pub struct FifoReplacer {
    /// `(frame, stamp)` in the order frames became evictable (front = oldest).
    queue: VecDeque<(FrameId, u64)>,

    /// Evictable frames and the stamp of their live queue entry.
    evictable: HashMap<FrameId, u64>,

    next_stamp: u64,
}

impl FifoReplacer {
    /// Create a new FIFO replacer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a replacer sized for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            evictable: HashMap::with_capacity(capacity),
            next_stamp: 0,
        }
    }

    /// Drop queue entries that no longer name an evictable frame.
    fn compact(&mut self) {
        let evictable = &self.evictable;
        self.queue
            .retain(|(frame_id, stamp)| evictable.get(frame_id) == Some(stamp));
    }
}

impl Replacer for FifoReplacer {
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if !evictable {
            self.evictable.remove(&frame_id);
            return;
        }
        if self.evictable.contains_key(&frame_id) {
            return;
        }

        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.queue.push_back((frame_id, stamp));
        self.evictable.insert(frame_id, stamp);

        if self.queue.len() > self.evictable.len() * 2 + COMPACT_SLACK {
            self.compact();
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        while let Some((frame_id, stamp)) = self.queue.pop_front() {
            if self.evictable.get(&frame_id) == Some(&stamp) {
                self.evictable.remove(&frame_id);
                return Some(frame_id);
            }
            // Re-pinned since it was queued
        }
        None
    }

    fn remove(&mut self, frame_id: FrameId) {
        // The queue entry goes stale and is skipped by evict()
        self.evictable.remove(&frame_id);
    }

    fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(n: usize) -> FrameId {
        FrameId::new(n)
    }

    #[test]
    fn test_fifo_basic() {
        let mut replacer = FifoReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(2), true);

        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_skips_repinned_head() {
        let mut replacer = FifoReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // Frame 0 is pinned again after becoming eligible
        replacer.set_evictable(fid(0), false);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_orders_by_unpin_time() {
        let mut replacer = FifoReplacer::new();

        // Frame 0 becomes eligible first, then is re-pinned and released
        // after frame 1: it must now go after frame 1.
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(0), false);
        replacer.set_evictable(fid(0), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_remove() {
        let mut replacer = FifoReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.remove(fid(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_repeat_evictable_keeps_position() {
        let mut replacer = FifoReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(0), true);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_fifo_queue_stays_bounded() {
        let mut replacer = FifoReplacer::new();

        for _ in 0..10_000 {
            replacer.set_evictable(fid(0), true);
            replacer.set_evictable(fid(0), false);
        }
        assert!(replacer.queue.len() <= 2 + COMPACT_SLACK);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }
}
