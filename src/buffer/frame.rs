//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the bookkeeping the pool needs:
//! - Which page is loaded (if any)
//! - Pin count
//! - Dirty bit

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// Point-in-time copy of a frame's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Resident page, or `None` for an empty frame.
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub dirty: bool,
}

/// A frame in the buffer pool.
///
/// The pool has a fixed number of frames allocated at startup; each holds
/// at most one page.
///
/// # Interior mutability
/// Bookkeeping changes happen under the pool's state lock; the fields use
/// atomics and `parking_lot` locks so a `&Frame` can be handed out to
/// callers that read the page:
/// - `page`: `RwLock` for read/write access to the content
/// - `page_id`: `Mutex`
/// - `pin_count`: `AtomicU32`
/// - `is_dirty`: `AtomicBool`
#[derive(Debug)]
pub struct Frame {
    page: RwLock<Page>,
    page_id: Mutex<Option<PageId>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Page ID
    // ========================================================================

    /// Get the page ID of the loaded page.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    #[inline]
    pub(crate) fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count, or `None` if it
    /// was already 0 (the count is left untouched).
    #[inline]
    pub(crate) fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .ok()
            .map(|old| old - 1)
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty bit
    // ========================================================================

    #[inline]
    pub(crate) fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Frame state
    // ========================================================================

    /// Check if the frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }

    /// A frame can be evicted when it holds a page nobody has pinned.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.page_id().is_some() && !self.is_pinned()
    }

    /// Snapshot the bookkeeping.
    pub fn descriptor(&self) -> FrameDescriptor {
        FrameDescriptor {
            page_id: self.page_id(),
            pin_count: self.pin_count(),
            dirty: self.is_dirty(),
        }
    }

    /// Take on a new page: pinned once, clean.
    pub(crate) fn install(&self, page_id: PageId) {
        self.set_page_id(Some(page_id));
        self.pin_count.store(1, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Forget the resident page. Content is left as is.
    pub(crate) fn evict(&self) {
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Reset the frame to the empty state and zero its content.
    pub(crate) fn reset(&self) {
        self.page_mut().reset();
        self.evict();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new();
        assert!(frame.is_empty());
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(
            frame.descriptor(),
            FrameDescriptor {
                page_id: None,
                pin_count: 0,
                dirty: false
            }
        );
    }

    #[test]
    fn test_frame_pin_unpin() {
        let frame = Frame::new();

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_frame_unpin_at_zero_is_rejected() {
        let frame = Frame::new();
        assert_eq!(frame.unpin(), None);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_frame_install() {
        let frame = Frame::new();
        frame.mark_dirty();
        frame.install(PageId::new(7));

        assert_eq!(frame.page_id(), Some(PageId::new(7)));
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());
        assert!(!frame.is_evictable());

        frame.unpin();
        assert!(frame.is_evictable());
    }

    #[test]
    fn test_frame_reset() {
        let frame = Frame::new();

        frame.install(PageId::new(99));
        frame.mark_dirty();
        frame.page_mut().as_mut_slice()[100] = 0xFF;

        frame.reset();

        assert!(frame.is_empty());
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(frame.page().as_slice()[100], 0);
    }
}
