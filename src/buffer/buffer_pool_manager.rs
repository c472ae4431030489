//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Automatic dirty page write-back on eviction
//! - Pluggable eviction policies

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::buffer::replacer::{FifoReplacer, Replacer};
use crate::buffer::{
    BufferPoolStats, Frame, FrameDescriptor, PagePool, PageReadGuard, PageWriteGuard, PinMode,
};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::PageStore;

/// Manages a fixed pool of frames caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │    store     │      │
/// │  │ Vec<FrameId> │  │ dyn Replacer │  │dyn PageStore │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// Victim selection: an empty frame from the free list if there is one,
/// otherwise whatever the replacer yields. With the default FIFO replacer
/// that is the frame whose pin count reached 0 the longest time ago.
///
/// # Locking
/// `page_table`, `free_list` and `replacer` live behind one `Mutex`, so a
/// pin or unpin is a single critical section. The store is called with that
/// lock held only for raw page reads and writes, never for allocation,
/// because allocation pins space-map pages back through this pool.
///
/// # Usage
/// ```ignore
/// let db = Database::create("test.db", 1000, &StorageConfig::default())?;
/// let bpm = db.buffer_pool();
///
/// // Allocate a new page
/// let mut guard = bpm.new_page(1)?;
/// guard.as_mut_slice()[0] = 0xAB;
/// // guard drops: page marked dirty, unpinned
///
/// // Or use the raw protocol
/// let frame = bpm.pin_page(page_id, PinMode::Read)?;
/// let byte = frame.page().as_slice()[0];
/// bpm.unpin_page(page_id, false)?;
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Page table, free list and replacer.
    state: Mutex<PoolState>,

    /// Raw page I/O and run allocation.
    store: Arc<dyn PageStore>,

    /// Performance statistics.
    stats: BufferPoolStats,
}

struct PoolState {
    /// Maps resident page IDs to the frame holding them.
    page_table: HashMap<PageId, FrameId>,

    /// Frames holding no page; popped from the back.
    free_list: Vec<FrameId>,

    /// Eviction policy over frames with pin count 0.
    replacer: Box<dyn Replacer>,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` frames with FIFO replacement.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, store: Arc<dyn PageStore>) -> Self {
        Self::with_replacer(
            pool_size,
            store,
            Box::new(FifoReplacer::with_capacity(pool_size)),
        )
    }

    /// Create a pool with a caller-chosen replacement policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_replacer(
        pool_size: usize,
        store: Arc<dyn PageStore>,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // Reversed so frame 0 is handed out first
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                replacer,
            }),
            store,
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: scoped access
    // ========================================================================

    /// Fetch a page for reading. Unpinned clean when the guard drops.
    ///
    /// # Errors
    /// - `Error::BufferPoolExceeded` if the page is not resident and all
    ///   frames are pinned
    /// - `Error::InvalidPageNumber` if the page doesn't exist on disk
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        PageReadGuard::pin(self, page_id)
    }

    /// Fetch a page for writing. Unpinned dirty when the guard drops.
    ///
    /// # Errors
    /// Same as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        PageWriteGuard::pin(self, page_id, PinMode::Read)
    }

    // ========================================================================
    // Public API: allocate and free
    // ========================================================================

    /// Allocate a run of `count` pages on disk and pin the first one.
    ///
    /// The first page is pinned as new (zeroed, not read from disk). If it
    /// cannot be pinned, the whole run is released again before the error
    /// is returned.
    ///
    /// # Errors
    /// - `Error::InvalidRunSize` / `Error::OutOfSpace` from the store
    /// - `Error::BufferPoolExceeded` if no frame is available
    pub fn allocate_and_pin(&self, count: u32) -> Result<PageId> {
        self.allocate_and_pin_frame(count).map(|(page_id, _)| page_id)
    }

    /// [`allocate_and_pin`](Self::allocate_and_pin) wrapped in a write guard.
    pub fn new_page(&self, count: u32) -> Result<PageWriteGuard<'_>> {
        let (page_id, frame) = self.allocate_and_pin_frame(count)?;
        Ok(PageWriteGuard::adopt(self, page_id, frame.page_mut()))
    }

    /// Drop an unpinned page from the pool and deallocate it on disk.
    ///
    /// Pages that are not resident are deallocated directly.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is resident and pinned
    /// - Errors from the store's deallocation
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        {
            let mut state = self.state.lock();
            if let Some(frame_id) = state.page_table.get(&page_id).copied() {
                let frame = &self.frames[frame_id.0];
                if frame.is_pinned() {
                    return Err(Error::PagePinned(page_id));
                }

                state.page_table.remove(&page_id);
                state.replacer.remove(frame_id);
                frame.reset();
                state.free_list.push(frame_id);
            }
        }

        self.store.deallocate_run(self, page_id, 1)
    }

    // ========================================================================
    // Public API: flush pages
    // ========================================================================

    /// Write a resident page to disk if it is dirty.
    ///
    /// Do not call while holding a write guard on the same page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page is not resident
    /// - I/O errors from the store, unmodified
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let state = self.state.lock();
        let &frame_id = state
            .page_table
            .get(&page_id)
            .ok_or(Error::PageNotFound(page_id))?;

        self.write_back(&self.frames[frame_id.0], page_id)
    }

    /// Write every dirty resident page to disk.
    ///
    /// # Errors
    /// The first I/O error from the store; pages after it stay dirty.
    pub fn flush_all(&self) -> Result<()> {
        let state = self.state.lock();
        for (&page_id, &frame_id) in state.page_table.iter() {
            self.write_back(&self.frames[frame_id.0], page_id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: introspection
    // ========================================================================

    /// Total number of frames.
    pub fn num_buffers(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames with pin count 0, empty frames included.
    pub fn num_unpinned(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_pinned()).count()
    }

    /// Pin count of a resident page, or `None` if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.frame_of(page_id)
            .map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    /// Frame holding `page_id`, if resident.
    pub fn frame_of(&self, page_id: PageId) -> Option<FrameId> {
        self.state.lock().page_table.get(&page_id).copied()
    }

    /// Frame by id.
    ///
    /// # Panics
    /// Panics if `frame_id` is out of range.
    pub fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    /// Bookkeeping snapshot of a frame.
    ///
    /// # Panics
    /// Panics if `frame_id` is out of range.
    pub fn frame_descriptor(&self, frame_id: FrameId) -> FrameDescriptor {
        self.frames[frame_id.0].descriptor()
    }

    /// Resident pages in ascending order.
    pub fn resident_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn allocate_and_pin_frame(&self, count: u32) -> Result<(PageId, &Frame)> {
        let page_id = self.store.allocate_run(self, count)?;

        match self.pin_page(page_id, PinMode::NewEmpty) {
            Ok(frame) => {
                debug!("allocated run of {} pages at {}", count, page_id);
                Ok((page_id, frame))
            }
            Err(e) => {
                if let Err(release) = self.store.deallocate_run(self, page_id, count) {
                    warn!(
                        "failed to release run of {} pages at {} after pin error: {}",
                        count, page_id, release
                    );
                }
                Err(e)
            }
        }
    }

    /// Get a frame to load a page into, evicting if necessary.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(Error::BufferPoolExceeded)?;
        let frame = &self.frames[frame_id.0];
        debug_assert!(!frame.is_pinned(), "replacer returned a pinned frame");

        let Some(old_page_id) = frame.page_id() else {
            return Ok(frame_id);
        };

        if let Err(e) = self.write_back(frame, old_page_id) {
            // Victim stays resident; make it eligible again
            state.replacer.set_evictable(frame_id, true);
            return Err(e);
        }

        state.page_table.remove(&old_page_id);
        frame.evict();
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        debug!("evicted {} from {}", old_page_id, frame_id);

        Ok(frame_id)
    }

    /// Write a frame to disk if dirty, then clear its dirty bit.
    fn write_back(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        if !frame.is_dirty() {
            return Ok(());
        }

        let page = frame.page();
        self.store.write_page(page_id, &page)?;
        drop(page);

        frame.clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl PagePool for BufferPoolManager {
    fn pin_page(&self, page_id: PageId, mode: PinMode) -> Result<&Frame> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageNumber(page_id));
        }

        let mut state = self.state.lock();

        if let Some(frame_id) = state.page_table.get(&page_id).copied() {
            let frame = &self.frames[frame_id.0];
            if frame.pin() == 1 {
                state.replacer.set_evictable(frame_id, false);
            }
            state.replacer.record_access(frame_id);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(frame);
        }

        self.store.check_page(page_id)?;

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        match mode {
            PinMode::Read => {
                let mut page = frame.page_mut();
                if let Err(e) = self.store.read_page(page_id, &mut page) {
                    drop(page);
                    state.free_list.push(frame_id);
                    return Err(e);
                }
                self.stats.pages_read.fetch_add(1, Ordering::Relaxed);
            }
            PinMode::NewEmpty => frame.page_mut().reset(),
        }

        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);

        Ok(frame)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();
        let &frame_id = state
            .page_table
            .get(&page_id)
            .ok_or(Error::PageNotFound(page_id))?;
        let frame = &self.frames[frame_id.0];

        if !frame.is_pinned() {
            return Err(Error::PageAlreadyUnpinned(page_id));
        }
        if is_dirty {
            frame.mark_dirty();
        }
        if frame.unpin() == Some(0) {
            state.replacer.set_evictable(frame_id, true);
        }
        Ok(())
    }
}
