//! Eviction policy implementations (replacers).
//!
//! The buffer pool talks to its policy only through [`Replacer`], so a new
//! policy (LRU, CLOCK, ...) can be added without touching the pin/unpin
//! contract. Currently implements:
//! - [`FifoReplacer`] - evict the frame that has been unpinned the longest

mod fifo;

pub use fifo::FifoReplacer;

use crate::common::config::ReplacementPolicy;
use crate::common::FrameId;

/// Chooses which unpinned frame gives up its page.
///
/// The pool calls [`set_evictable`](Replacer::set_evictable) whenever a
/// frame's pin count moves between 0 and 1, and [`evict`](Replacer::evict)
/// when it needs a frame. A replacer must never return a frame that is not
/// currently evictable.
pub trait Replacer: Send {
    /// A frame was pinned. Policies that track recency use this; FIFO does
    /// not.
    fn record_access(&mut self, _frame_id: FrameId) {}

    /// Mark a frame as evictable (pin count reached 0) or not (pinned).
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);

    /// Pick a victim and stop tracking it, or `None` if nothing is evictable.
    fn evict(&mut self) -> Option<FrameId>;

    /// Stop tracking a frame whose page left the pool without eviction.
    fn remove(&mut self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

impl ReplacementPolicy {
    /// Build the replacer for a pool of `pool_size` frames.
    pub fn build(self, pool_size: usize) -> Box<dyn Replacer> {
        match self {
            ReplacementPolicy::Fifo => Box::new(FifoReplacer::with_capacity(pool_size)),
        }
    }
}
