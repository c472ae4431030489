//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the buffer pool as it serves pins.
///
/// Each counter is independent, so `Ordering::Relaxed` is enough; read them
/// together through [`snapshot`](Self::snapshot).
///
/// # Example
/// ```
/// use pagekeeper::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_misses.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().cache_misses, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Pins served from a resident frame.
    pub cache_hits: AtomicU64,

    /// Pins that needed a frame: a disk read or a new empty page.
    pub cache_misses: AtomicU64,

    /// Resident pages dropped to make room.
    pub evictions: AtomicU64,

    /// Pages read from the store.
    pub pages_read: AtomicU64,

    /// Dirty pages written to the store, by eviction or flush.
    pub pages_written: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of pins served without a miss, 0.0 before any pin.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of [`BufferPoolStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
}

impl StatsSnapshot {
    /// Total pins observed.
    pub fn pins(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }

    pub fn hit_rate(&self) -> f64 {
        match self.pins() {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pins: {} (hit rate {:.2}%), evictions: {}, reads: {}, writes: {}",
            self.pins(),
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written
        )
    }
}
