//! pagekeeper - the bottom two layers of a relational storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Database                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager + Frame + FIFO Replacer + Stats      │   │
//! │  │        pin_page / unpin_page  (PagePool trait)           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │            ↓ read/write/allocate        ↑ pin map & header     │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Storage Layer (storage/)                  │   │
//! │  │   DiskSpaceManager: file, space map, file directory      │   │
//! │  │              (PageStore trait)                           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two managers depend on each other: the pool reads, writes and
//! allocates pages through the disk side, and the disk side keeps its own
//! metadata pages in the pool. Each sees the other only through a trait
//! ([`PageStore`], [`PagePool`]), and [`Database`] wires them together.
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`storage`] - The database file and page formats
//!
//! # Quick Start
//! ```no_run
//! use pagekeeper::{Database, StorageConfig};
//!
//! let db = Database::create("my_database.db", 1000, &StorageConfig::default()).unwrap();
//!
//! // Allocate a page through the pool and write to it
//! let page_id = {
//!     let mut guard = db.buffer_pool().new_page(1).unwrap();
//!     guard.as_mut_slice()[0] = 0x42;
//!     guard.page_id()
//! };
//! db.add_file_entry("heap", page_id).unwrap();
//! db.close().unwrap();
//! ```

pub mod buffer;
pub mod common;
mod database;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{ReplacementPolicy, StorageConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result};
pub use database::Database;

pub use buffer::{
    BufferPoolManager, BufferPoolStats, Frame, FrameDescriptor, PagePool, PageReadGuard,
    PageWriteGuard, PinMode, StatsSnapshot,
};
pub use storage::page::{FileEntry, Page};
pub use storage::{DiskSpaceManager, PageStore};
