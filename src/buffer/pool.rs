//! The pin/unpin capability.
//!
//! [`PagePool`] is what the buffer pool offers everyone above it, including
//! the disk space manager, which pins its own space-map and header pages
//! through it. Keeping it a trait lets the space manager be driven by any
//! pool (and lets tests drive it with one).

use crate::buffer::Frame;
use crate::common::{PageId, Result};

/// How a non-resident page is brought into its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Read the page content from disk.
    Read,
    /// Skip the disk read and hand out a zeroed frame; the caller is about
    /// to overwrite the whole page.
    NewEmpty,
}

/// Pin-counted access to cached pages.
pub trait PagePool {
    /// Pin `page_id` and return the frame holding it.
    ///
    /// A resident page just gains a pin (`mode` is ignored). Otherwise a
    /// frame is freed up and filled according to `mode`.
    ///
    /// # Errors
    /// - `Error::BufferPoolExceeded` if the page is not resident and every
    ///   frame is pinned
    /// - Whatever the page store returns for the write-back or read
    fn pin_page(&self, page_id: PageId, mode: PinMode) -> Result<&Frame>;

    /// Release one pin on `page_id`, marking it dirty if `is_dirty`.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page is not resident
    /// - `Error::PageAlreadyUnpinned` if its pin count is already 0
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()>;
}
