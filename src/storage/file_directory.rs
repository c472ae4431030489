//! File directory: named entries mapping to start pages.
//!
//! The directory is a chain of header pages. Page 0 heads it; further
//! directory pages are allocated on demand when every slot in the chain is
//! taken, and linked at the tail. Directory pages are never reclaimed.

use log::{debug, warn};

use super::DiskSpaceManager;
use crate::buffer::{PagePool, PageReadGuard, PageWriteGuard, PinMode};
use crate::common::config::NAME_MAXLEN;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{FileEntry, HeaderKind, HeaderPage};

/// Outcome of walking the directory chain.
enum Walk<T> {
    /// The visitor stopped the walk.
    Found(T),
    /// Every page was visited; `tail` is the last one.
    End { tail: PageId },
}

impl DiskSpaceManager {
    /// Visit every header page in chain order until `visit` returns `Some`.
    ///
    /// Each page is pinned for reading only while it is visited.
    ///
    /// # Errors
    /// `Error::CorruptHeader` if the chain is longer than the database,
    /// i.e. it loops.
    fn walk_directory<T>(
        &self,
        pool: &dyn PagePool,
        mut visit: impl FnMut(PageId, &HeaderPage<PageReadGuard<'_>>) -> Option<T>,
    ) -> Result<Walk<T>> {
        let num_pages = self.num_pages()?;
        let mut current = PageId::FIRST;

        for _ in 0..num_pages {
            let guard = PageReadGuard::pin(pool, current)?;
            let header = HeaderPage::open(guard, HeaderKind::for_page(current));

            if let Some(found) = visit(current, &header) {
                return Ok(Walk::Found(found));
            }

            let next = header.next_page();
            if !next.is_valid() {
                return Ok(Walk::End { tail: current });
            }
            current = next;
        }

        Err(Error::CorruptHeader(format!(
            "directory chain exceeds {} pages",
            num_pages
        )))
    }

    /// Record `name` as starting at `start`.
    ///
    /// Uses the first free slot in chain order. When there is none, a new
    /// directory page is allocated, formatted and linked at the tail.
    ///
    /// # Errors
    /// - `Error::FileNameTooLong` if `name` is `NAME_MAXLEN` bytes or longer
    /// - `Error::InvalidPageNumber` if `start` is out of range
    /// - `Error::DuplicateEntry` if `name` is already present
    /// - Allocation errors for the new directory page
    pub fn add_file_entry(&self, pool: &dyn PagePool, name: &str, start: PageId) -> Result<()> {
        if name.len() >= NAME_MAXLEN {
            return Err(Error::FileNameTooLong(name.to_string()));
        }
        if start.0 >= self.num_pages()? {
            return Err(Error::InvalidPageNumber(start));
        }
        if self.get_file_entry(pool, name)?.is_some() {
            return Err(Error::DuplicateEntry(name.to_string()));
        }

        match self.walk_directory(pool, |page_id, header| {
            header.find_free().map(|slot| (page_id, slot))
        })? {
            Walk::Found((page_id, slot)) => {
                let guard = PageWriteGuard::pin(pool, page_id, PinMode::Read)?;
                let mut header = HeaderPage::open(guard, HeaderKind::for_page(page_id));
                header.set_entry(slot, start, name);
            }
            Walk::End { tail } => {
                let new_page = self.append_directory_page(pool, tail)?;
                let guard = PageWriteGuard::pin(pool, new_page, PinMode::Read)?;
                let mut header = HeaderPage::open(guard, HeaderKind::Directory);
                header.set_entry(0, start, name);
            }
        }

        debug!("directory: added {:?} -> {}", name, start);
        Ok(())
    }

    /// Allocate and format a directory page, then link it after `tail`.
    ///
    /// If formatting or linking fails the page is released again and the
    /// original error returned.
    fn append_directory_page(&self, pool: &dyn PagePool, tail: PageId) -> Result<PageId> {
        let new_page = self.allocate_run(pool, 1)?;

        if let Err(e) = Self::format_and_link(pool, new_page, tail) {
            if let Err(release) = self.deallocate_run(pool, new_page, 1) {
                warn!(
                    "directory: failed to release page {} after error: {}",
                    new_page, release
                );
            }
            return Err(e);
        }

        debug!("directory: linked {} after {}", new_page, tail);
        Ok(new_page)
    }

    fn format_and_link(pool: &dyn PagePool, new_page: PageId, tail: PageId) -> Result<()> {
        {
            let guard = PageWriteGuard::pin(pool, new_page, PinMode::NewEmpty)?;
            HeaderPage::init(guard, HeaderKind::Directory);
        }

        let guard = PageWriteGuard::pin(pool, tail, PinMode::Read)?;
        let mut header = HeaderPage::open(guard, HeaderKind::for_page(tail));
        header.set_next_page(new_page);
        Ok(())
    }

    /// Remove the entry for `name`, freeing its slot.
    ///
    /// # Errors
    /// `Error::FileEntryNotFound` if there is no such entry.
    pub fn delete_file_entry(&self, pool: &dyn PagePool, name: &str) -> Result<()> {
        let found = self.walk_directory(pool, |page_id, header| {
            header.find(name).map(|slot| (page_id, slot))
        })?;

        let Walk::Found((page_id, slot)) = found else {
            return Err(Error::FileEntryNotFound(name.to_string()));
        };

        let guard = PageWriteGuard::pin(pool, page_id, PinMode::Read)?;
        let mut header = HeaderPage::open(guard, HeaderKind::for_page(page_id));
        header.clear_entry(slot);

        debug!("directory: deleted {:?}", name);
        Ok(())
    }

    /// Start page recorded for `name`, if any.
    pub fn get_file_entry(&self, pool: &dyn PagePool, name: &str) -> Result<Option<PageId>> {
        let found = self.walk_directory(pool, |_, header| {
            header.find(name).map(|slot| header.slot_start_page(slot))
        })?;

        Ok(match found {
            Walk::Found(start) => Some(start),
            Walk::End { .. } => None,
        })
    }

    /// Every entry in chain order.
    pub fn file_entries(&self, pool: &dyn PagePool) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        self.walk_directory(pool, |_, header| {
            entries.extend((0..header.num_entries()).filter_map(|slot| header.entry(slot)));
            None::<()>
        })?;
        Ok(entries)
    }
}
