//! Storage layer - the database file and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskSpaceManager`] - File lifecycle, page I/O, space map, directory
//! - [`PageStore`] - What the buffer pool needs from the disk side
//! - [`page`] - Page buffer and header page layout

mod disk_manager;
mod file_directory;
pub mod page;
mod page_store;
mod space_map;

pub use disk_manager::DiskSpaceManager;
pub use page_store::PageStore;
