//! The database handle: one buffer pool over one disk space manager.

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::buffer::BufferPoolManager;
use crate::common::config::StorageConfig;
use crate::common::{PageId, Result};
use crate::storage::page::FileEntry;
use crate::storage::DiskSpaceManager;

/// An open database.
///
/// Owns the [`DiskSpaceManager`] (shared with the pool as its page store)
/// and the [`BufferPoolManager`]. Space map and directory operations are
/// routed through the pool.
///
/// # Example
/// ```no_run
/// use pagekeeper::{Database, StorageConfig};
///
/// let db = Database::create("orders.db", 1000, &StorageConfig::default())?;
/// let start = db.allocate_run(4)?;
/// db.add_file_entry("orders", start)?;
/// db.close()?;
/// # Ok::<(), pagekeeper::Error>(())
/// ```
pub struct Database {
    disk: Arc<DiskSpaceManager>,
    pool: BufferPoolManager,
}

impl Database {
    fn build(config: &StorageConfig) -> Result<(Arc<DiskSpaceManager>, BufferPoolManager)> {
        config.validate()?;
        let disk = Arc::new(DiskSpaceManager::new(config.bits_per_map_page));
        let pool = BufferPoolManager::with_replacer(
            config.pool_size,
            disk.clone(),
            config.replacement.build(config.pool_size),
        );
        Ok((disk, pool))
    }

    /// Create a database of `num_pages` pages at `path`, replacing any file
    /// already there.
    ///
    /// The header and space map are flushed before returning.
    pub fn create<P: AsRef<Path>>(path: P, num_pages: u32, config: &StorageConfig) -> Result<Self> {
        let (disk, pool) = Self::build(config)?;
        disk.create_database(&pool, path, num_pages)?;
        pool.flush_all()?;
        Ok(Self { disk, pool })
    }

    /// Open an existing database at `path`.
    ///
    /// `config.bits_per_map_page` must match the value it was created with.
    pub fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let (disk, pool) = Self::build(config)?;
        disk.open_database(&pool, path)?;
        Ok(Self { disk, pool })
    }

    /// Flush every dirty page, sync and close the file.
    pub fn close(self) -> Result<()> {
        self.pool.flush_all()?;
        let stats = self.pool.stats().snapshot();
        self.disk.close_database()?;
        info!("buffer pool at close: {}", stats);
        Ok(())
    }

    /// Discard cached pages and delete the file.
    pub fn destroy(self) -> Result<()> {
        self.disk.destroy_database()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.pool
    }

    pub fn disk(&self) -> &DiskSpaceManager {
        &self.disk
    }

    /// Number of pages in the database.
    pub fn num_pages(&self) -> Result<u32> {
        self.disk.num_pages()
    }

    // ========================================================================
    // Space map
    // ========================================================================

    /// Allocate `run_size` contiguous pages; see
    /// [`DiskSpaceManager::allocate_run`].
    pub fn allocate_run(&self, run_size: u32) -> Result<PageId> {
        self.disk.allocate_run(&self.pool, run_size)
    }

    pub fn deallocate_run(&self, start: PageId, run_size: u32) -> Result<()> {
        self.disk.deallocate_run(&self.pool, start, run_size)
    }

    pub fn is_allocated(&self, page_id: PageId) -> Result<bool> {
        self.disk.is_allocated(&self.pool, page_id)
    }

    pub fn dump_space_map(&self) -> Result<String> {
        self.disk.dump_space_map(&self.pool)
    }

    // ========================================================================
    // File directory
    // ========================================================================

    pub fn add_file_entry(&self, name: &str, start: PageId) -> Result<()> {
        self.disk.add_file_entry(&self.pool, name, start)
    }

    pub fn delete_file_entry(&self, name: &str) -> Result<()> {
        self.disk.delete_file_entry(&self.pool, name)
    }

    pub fn get_file_entry(&self, name: &str) -> Result<Option<PageId>> {
        self.disk.get_file_entry(&self.pool, name)
    }

    pub fn file_entries(&self) -> Result<Vec<FileEntry>> {
        self.disk.file_entries(&self.pool)
    }
}
