//! The raw-I/O and allocation capability the buffer pool depends on.

use crate::buffer::PagePool;
use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Page I/O and run allocation on the backing store.
///
/// The buffer pool holds one of these. Allocation needs to pin space-map
/// pages, so the pool passes itself back in as a [`PagePool`]; this keeps
/// the two components mutually recursive per call without either owning
/// the other.
pub trait PageStore: Send + Sync {
    /// Check that `page_id` names a page of the backing store.
    ///
    /// The pool calls this before giving a frame to a page it will not
    /// read, so pages that could never be written back are refused.
    fn check_page(&self, page_id: PageId) -> Result<()>;

    /// Read `page_id` into `page`.
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Write `page` to `page_id`.
    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()>;

    /// Allocate `run_size` contiguous pages and return the first.
    fn allocate_run(&self, pool: &dyn PagePool, run_size: u32) -> Result<PageId>;

    /// Release `run_size` pages starting at `start`.
    fn deallocate_run(&self, pool: &dyn PagePool, start: PageId, run_size: u32) -> Result<()>;
}
