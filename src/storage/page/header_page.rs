//! Header pages of the file directory.
//!
//! The file directory is a singly linked chain of header pages. Page 0 is
//! the *first* header page and also records the database size; any further
//! pages are *directory* pages allocated on demand.
//!
//! # Layout (little-endian)
//! ```text
//! Offset            Size  Field
//! ------            ----  -----
//! 0                 4     next_page    (PageId, INVALID ends the chain)
//! 4                 4     num_entries  (slots on this page)
//! 8 + i*56          4     entry[i].start_page (INVALID = free slot)
//! 12 + i*56         52    entry[i].name (NUL padded)
//! PAGE_SIZE - 4     4     num_db_pages (first page only)
//! ```

use std::ops::{Deref, DerefMut};

use crate::common::config::{NAME_MAXLEN, PAGE_SIZE};
use crate::common::PageId;
use crate::storage::page::Page;

pub const OFFSET_NEXT_PAGE: usize = 0;
pub const OFFSET_NUM_ENTRIES: usize = 4;
pub const OFFSET_ENTRIES: usize = 8;
pub const OFFSET_NUM_DB_PAGES: usize = PAGE_SIZE - 4;

/// Width of the name field; leaves room for a terminator.
pub const NAME_FIELD: usize = NAME_MAXLEN + 2;

/// Size of one `{start_page, name}` slot.
pub const ENTRY_SIZE: usize = 4 + NAME_FIELD;

#[inline]
fn entry_offset(slot: usize) -> usize {
    OFFSET_ENTRIES + slot * ENTRY_SIZE
}

/// Which of the two header layouts a page uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Page 0: directory slots plus the trailing page count.
    First,
    /// A chained directory page.
    Directory,
}

impl HeaderKind {
    /// Page 0 is the first header page, every other chain member is a
    /// directory page.
    pub fn for_page(page_id: PageId) -> Self {
        if page_id == PageId::FIRST {
            HeaderKind::First
        } else {
            HeaderKind::Directory
        }
    }

    /// Bytes reserved outside the slot table.
    const fn reserved_bytes(self) -> usize {
        match self {
            HeaderKind::Directory => 16,
            HeaderKind::First => 20,
        }
    }

    /// Number of file-entry slots a page of this kind holds.
    pub const fn capacity(self) -> usize {
        (PAGE_SIZE - self.reserved_bytes()) / ENTRY_SIZE
    }
}

/// A named pointer to the first page of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub start_page: PageId,
    pub name: String,
}

/// Typed view over a header page.
///
/// `P` is anything that derefs to a [`Page`]: a plain reference, or one of
/// the buffer pool's page guards.
pub struct HeaderPage<P> {
    page: P,
    kind: HeaderKind,
}

impl<P> HeaderPage<P> {
    /// Which layout this view uses.
    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    /// Give back the underlying page.
    pub fn into_inner(self) -> P {
        self.page
    }
}

impl<P: Deref<Target = Page>> HeaderPage<P> {
    /// Interpret an existing header page.
    pub fn open(page: P, kind: HeaderKind) -> Self {
        Self { page, kind }
    }

    /// Next page in the chain, or `PageId::INVALID` at the tail.
    pub fn next_page(&self) -> PageId {
        PageId(self.page.read_u32(OFFSET_NEXT_PAGE))
    }

    /// Slots on this page, never more than the layout can hold.
    pub fn num_entries(&self) -> usize {
        (self.page.read_u32(OFFSET_NUM_ENTRIES) as usize).min(self.kind.capacity())
    }

    /// Start page stored in `slot`; `INVALID` marks a free slot.
    pub fn slot_start_page(&self, slot: usize) -> PageId {
        PageId(self.page.read_u32(entry_offset(slot)))
    }

    /// Raw name bytes in `slot`, up to the first NUL.
    pub fn slot_name(&self, slot: usize) -> &[u8] {
        let start = entry_offset(slot) + 4;
        let field = &self.page.as_slice()[start..start + NAME_FIELD];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        &field[..end]
    }

    /// Decoded entry in `slot`, or `None` if the slot is free.
    pub fn entry(&self, slot: usize) -> Option<FileEntry> {
        let start_page = self.slot_start_page(slot);
        if !start_page.is_valid() {
            return None;
        }
        Some(FileEntry {
            start_page,
            name: String::from_utf8_lossy(self.slot_name(slot)).into_owned(),
        })
    }

    /// Slot holding `name`, if any.
    pub fn find(&self, name: &str) -> Option<usize> {
        (0..self.num_entries()).find(|&slot| {
            self.slot_start_page(slot).is_valid() && self.slot_name(slot) == name.as_bytes()
        })
    }

    /// First free slot, if any.
    pub fn find_free(&self) -> Option<usize> {
        (0..self.num_entries()).find(|&slot| !self.slot_start_page(slot).is_valid())
    }

    /// Database size recorded on the first header page.
    ///
    /// Returns `None` on directory pages.
    pub fn num_db_pages(&self) -> Option<u32> {
        match self.kind {
            HeaderKind::First => Some(self.page.read_u32(OFFSET_NUM_DB_PAGES)),
            HeaderKind::Directory => None,
        }
    }
}

impl<P: DerefMut<Target = Page>> HeaderPage<P> {
    /// Format a fresh header page: no successor, every slot free.
    pub fn init(mut page: P, kind: HeaderKind) -> Self {
        page.reset();
        let capacity = kind.capacity();
        page.write_u32(OFFSET_NEXT_PAGE, PageId::INVALID.0);
        page.write_u32(OFFSET_NUM_ENTRIES, capacity as u32);
        for slot in 0..capacity {
            page.write_u32(entry_offset(slot), PageId::INVALID.0);
        }
        Self { page, kind }
    }

    /// Link this page to the next one in the chain.
    pub fn set_next_page(&mut self, next: PageId) {
        self.page.write_u32(OFFSET_NEXT_PAGE, next.0);
    }

    /// Store `(start_page, name)` in `slot`.
    ///
    /// The name is truncated to the field width; callers check the length
    /// beforehand.
    pub fn set_entry(&mut self, slot: usize, start_page: PageId, name: &str) {
        let offset = entry_offset(slot);
        self.page.write_u32(offset, start_page.0);

        let field = &mut self.page.as_mut_slice()[offset + 4..offset + 4 + NAME_FIELD];
        field.fill(0);
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_FIELD - 1);
        field[..len].copy_from_slice(&bytes[..len]);
    }

    /// Mark `slot` free.
    pub fn clear_entry(&mut self, slot: usize) {
        self.set_entry(slot, PageId::INVALID, "");
    }

    /// Record the database size. Only meaningful on the first page.
    pub fn set_num_db_pages(&mut self, num_pages: u32) {
        debug_assert_eq!(self.kind, HeaderKind::First);
        self.page.write_u32(OFFSET_NUM_DB_PAGES, num_pages);
    }
}
