//! RAII guards for page access.
//!
//! These guards hold one pin for as long as they live:
//! - [`PageReadGuard`] - Shared read access, unpins clean
//! - [`PageWriteGuard`] - Exclusive write access, unpins dirty
//!
//! They work against any [`PagePool`], so every internal pin the disk space
//! manager takes on its own pages is released on every exit path, errors
//! included.

use std::ops::{Deref, DerefMut};

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::pool::{PagePool, PinMode};
use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let data = guard.as_slice();  // Deref to &Page
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    pool: &'a dyn PagePool,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    /// Pin `page_id` (reading it from disk on a miss) and lock it for reading.
    pub fn pin(pool: &'a dyn PagePool, page_id: PageId) -> Result<Self> {
        let frame = pool.pin_page(page_id, PinMode::Read)?;
        Ok(Self {
            pool,
            page_id,
            lock: frame.page(),
        })
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.unpin_page(self.page_id, false) {
            warn!("read guard for {} failed to unpin: {}", self.page_id, e);
        }
    }
}

/// Guard for exclusive write access to a page.
///
/// The page is marked dirty and unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;  // DerefMut to &mut Page
/// // guard drops here, page marked dirty and unpinned
/// ```
pub struct PageWriteGuard<'a> {
    pool: &'a dyn PagePool,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl<'a> PageWriteGuard<'a> {
    /// Pin `page_id` according to `mode` and lock it for writing.
    pub fn pin(pool: &'a dyn PagePool, page_id: PageId, mode: PinMode) -> Result<Self> {
        let frame = pool.pin_page(page_id, mode)?;
        Ok(Self {
            pool,
            page_id,
            lock: frame.page_mut(),
        })
    }

    /// Wrap a pin the caller already holds; the guard releases it.
    pub(crate) fn adopt(
        pool: &'a dyn PagePool,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            pool,
            page_id,
            lock,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.unpin_page(self.page_id, true) {
            warn!("write guard for {} failed to unpin: {}", self.page_id, e);
        }
    }
}
