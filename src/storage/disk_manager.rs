//! Disk Space Manager - the database file, its space map and directory.
//!
//! The [`DiskSpaceManager`] handles all direct file operations:
//! - Creating, opening, closing and destroying the database file
//! - Reading and writing pages
//! - Allocating page runs (see `space_map.rs`)
//! - Maintaining the file directory (see `file_directory.rs`)
//!
//! Its own metadata pages (header, space map, directory) are always accessed
//! through a [`PagePool`], never by reading the file directly, so they are
//! cached and written back like any other page.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::info;
use parking_lot::Mutex;

use crate::buffer::{PagePool, PageReadGuard, PageWriteGuard, PinMode};
use crate::common::config::{MIN_DB_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{HeaderKind, HeaderPage, Page};
use crate::storage::PageStore;

/// Manages one database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────┬─────────┬─────────┬─────┬─────────┐
/// │ Page 0  │ Page 1  │ ... │ Page m  │ Page m+1│ ... │ Page N-1│
/// │ header  │ map     │     │ map     │ data or │     │         │
/// │         │         │     │         │ dir page│     │         │
/// └─────────┴─────────┴─────┴─────────┴─────────┴─────┴─────────┘
/// Offset:  0      4096          m×4096                 (N-1)×4096
/// ```
///
/// `m = ceil(N / bits_per_map_page)`. Page 0 and the map pages are marked
/// allocated when the database is created.
///
/// # Thread Safety
/// The open file sits behind a `Mutex`. That lock is never held while
/// calling into the pool, so the pool may call [`read_page`](Self::read_page)
/// and [`write_page`](Self::write_page) while holding its own lock.
///
/// # Durability
/// Writes are not individually synced. [`close_database`](Self::close_database)
/// syncs the file.
pub struct DiskSpaceManager {
    /// Space map density; `PAGE_SIZE * 8` outside of tests.
    pub(crate) bits_per_map_page: u32,

    state: Mutex<Option<DbFile>>,
}

struct DbFile {
    file: File,
    path: PathBuf,
    num_pages: u32,
}

impl DbFile {
    fn check(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.num_pages {
            return Err(Error::InvalidPageNumber(page_id));
        }
        Ok(())
    }
}

impl DiskSpaceManager {
    /// Create a closed manager.
    ///
    /// # Panics
    /// Panics if `bits_per_map_page` is not in `8..=PAGE_SIZE * 8`;
    /// `StorageConfig::validate` rejects those values first.
    pub fn new(bits_per_map_page: usize) -> Self {
        assert!(
            (8..=PAGE_SIZE * 8).contains(&bits_per_map_page),
            "bits_per_map_page out of range: {}",
            bits_per_map_page
        );
        Self {
            bits_per_map_page: bits_per_map_page as u32,
            state: Mutex::new(None),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a database of `num_pages` pages (at least 2) at `path`.
    ///
    /// An existing file at `path` is replaced. Page 0 is formatted as the
    /// first header page and page 0 plus every space map page is marked
    /// allocated. The metadata is written through `pool`; flush it to make
    /// it durable.
    ///
    /// # Errors
    /// - `Error::DatabaseAlreadyOpen` if a database is open
    /// - `Error::FileIo` if the file cannot be created
    pub fn create_database<P: AsRef<Path>>(
        &self,
        pool: &dyn PagePool,
        path: P,
        num_pages: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        let num_pages = num_pages.max(MIN_DB_PAGES);

        {
            let mut state = self.state.lock();
            if state.is_some() {
                return Err(Error::DatabaseAlreadyOpen);
            }

            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)?;
            file.set_len(num_pages as u64 * PAGE_SIZE as u64)?;

            *state = Some(DbFile {
                file,
                path: path.to_path_buf(),
                num_pages,
            });
        }

        if let Err(e) = self.format(pool, num_pages) {
            *self.state.lock() = None;
            return Err(e);
        }

        info!(
            "created database {} with {} pages ({} space map pages)",
            path.display(),
            num_pages,
            self.num_map_pages(num_pages)
        );
        Ok(())
    }

    fn format(&self, pool: &dyn PagePool, num_pages: u32) -> Result<()> {
        {
            let guard = PageWriteGuard::pin(pool, PageId::FIRST, PinMode::NewEmpty)?;
            let mut header = HeaderPage::init(guard, HeaderKind::First);
            header.set_num_db_pages(num_pages);
        }

        self.set_bits(pool, 0, 1 + self.num_map_pages(num_pages), true)
    }

    /// Open an existing database and recover its size from page 0.
    ///
    /// # Errors
    /// - `Error::DatabaseAlreadyOpen` if a database is open
    /// - `Error::FileIo` if the file cannot be opened
    /// - `Error::CorruptHeader` if the recorded size is below 2 pages or
    ///   larger than the file
    pub fn open_database<P: AsRef<Path>>(&self, pool: &dyn PagePool, path: P) -> Result<()> {
        let path = path.as_ref();
        let file_pages;

        {
            let mut state = self.state.lock();
            if state.is_some() {
                return Err(Error::DatabaseAlreadyOpen);
            }

            let file = OpenOptions::new().read(true).write(true).open(path)?;
            file_pages = file.metadata()?.len() / PAGE_SIZE as u64;
            if file_pages < MIN_DB_PAGES as u64 {
                return Err(Error::CorruptHeader(format!(
                    "file holds {} pages, need at least {}",
                    file_pages, MIN_DB_PAGES
                )));
            }

            // Only page 0 is readable until the header has been read
            *state = Some(DbFile {
                file,
                path: path.to_path_buf(),
                num_pages: 1,
            });
        }

        let recorded = match self.read_num_db_pages(pool) {
            Ok(n) => n,
            Err(e) => {
                *self.state.lock() = None;
                return Err(e);
            }
        };

        let mut state = self.state.lock();
        if recorded < MIN_DB_PAGES || recorded as u64 > file_pages {
            *state = None;
            return Err(Error::CorruptHeader(format!(
                "header records {} pages, file holds {}",
                recorded, file_pages
            )));
        }
        if let Some(db) = state.as_mut() {
            db.num_pages = recorded;
        }

        info!("opened database {} ({} pages)", path.display(), recorded);
        Ok(())
    }

    fn read_num_db_pages(&self, pool: &dyn PagePool) -> Result<u32> {
        let guard = PageReadGuard::pin(pool, PageId::FIRST)?;
        let header = HeaderPage::open(guard, HeaderKind::First);
        header
            .num_db_pages()
            .ok_or_else(|| Error::CorruptHeader("page 0 is not a first header page".into()))
    }

    /// Sync and close the file.
    ///
    /// Cached pages are not flushed here; flush the pool first.
    ///
    /// # Errors
    /// `Error::DatabaseNotOpen` if nothing is open.
    pub fn close_database(&self) -> Result<()> {
        let db = self.state.lock().take().ok_or(Error::DatabaseNotOpen)?;
        db.file.sync_all()?;
        info!("closed database {}", db.path.display());
        Ok(())
    }

    /// Close the file and delete it.
    ///
    /// # Errors
    /// `Error::DatabaseNotOpen` if nothing is open.
    pub fn destroy_database(&self) -> Result<()> {
        let db = self.state.lock().take().ok_or(Error::DatabaseNotOpen)?;
        let DbFile { file, path, .. } = db;
        drop(file);
        fs::remove_file(&path)?;
        info!("destroyed database {}", path.display());
        Ok(())
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// Check that `page_id` is in `[0, num_pages)`.
    ///
    /// # Errors
    /// - `Error::DatabaseNotOpen` if nothing is open
    /// - `Error::InvalidPageNumber` if `page_id` is out of range
    pub fn check_page(&self, page_id: PageId) -> Result<()> {
        self.state
            .lock()
            .as_ref()
            .ok_or(Error::DatabaseNotOpen)?
            .check(page_id)
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// - `Error::DatabaseNotOpen` if nothing is open
    /// - `Error::InvalidPageNumber` if `page_id` is not in `[0, num_pages)`
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut state = self.state.lock();
        let db = state.as_mut().ok_or(Error::DatabaseNotOpen)?;
        db.check(page_id)?;

        db.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        db.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// Write a page to disk.
    ///
    /// # Errors
    /// - `Error::DatabaseNotOpen` if nothing is open
    /// - `Error::InvalidPageNumber` if `page_id` is not in `[0, num_pages)`
    pub fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.state.lock();
        let db = state.as_mut().ok_or(Error::DatabaseNotOpen)?;
        db.check(page_id)?;

        db.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        db.file.write_all(page.as_slice())?;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of pages in the open database.
    pub fn num_pages(&self) -> Result<u32> {
        self.state
            .lock()
            .as_ref()
            .map(|db| db.num_pages)
            .ok_or(Error::DatabaseNotOpen)
    }

    /// Path of the open database file.
    pub fn path(&self) -> Result<PathBuf> {
        self.state
            .lock()
            .as_ref()
            .map(|db| db.path.clone())
            .ok_or(Error::DatabaseNotOpen)
    }

    /// Display name of the open database file.
    pub fn db_name(&self) -> Result<String> {
        self.path().map(|p| p.display().to_string())
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Space map pages needed for `num_pages` pages.
    pub(crate) fn num_map_pages(&self, num_pages: u32) -> u32 {
        num_pages.div_ceil(self.bits_per_map_page)
    }
}

impl PageStore for DiskSpaceManager {
    fn check_page(&self, page_id: PageId) -> Result<()> {
        DiskSpaceManager::check_page(self, page_id)
    }

    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        DiskSpaceManager::read_page(self, page_id, page)
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        DiskSpaceManager::write_page(self, page_id, page)
    }

    fn allocate_run(&self, pool: &dyn PagePool, run_size: u32) -> Result<PageId> {
        DiskSpaceManager::allocate_run(self, pool, run_size)
    }

    fn deallocate_run(&self, pool: &dyn PagePool, start: PageId, run_size: u32) -> Result<()> {
        DiskSpaceManager::deallocate_run(self, pool, start, run_size)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::common::config::BITS_PER_PAGE;
    use tempfile::tempdir;

    fn setup(bits: usize) -> (Arc<DiskSpaceManager>, BufferPoolManager) {
        let dsm = Arc::new(DiskSpaceManager::new(bits));
        let bpm = BufferPoolManager::new(8, dsm.clone());
        (dsm, bpm)
    }

    #[test]
    fn test_create_sizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let (dsm, bpm) = setup(BITS_PER_PAGE);

        dsm.create_database(&bpm, &path, 100).unwrap();

        assert_eq!(dsm.num_pages().unwrap(), 100);
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            100 * PAGE_SIZE as u64
        );
        assert_eq!(dsm.path().unwrap(), path);
    }

    #[test]
    fn test_create_rounds_up_to_minimum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.db");
        let (dsm, bpm) = setup(BITS_PER_PAGE);

        dsm.create_database(&bpm, &path, 0).unwrap();
        assert_eq!(dsm.num_pages().unwrap(), MIN_DB_PAGES);
    }

    #[test]
    fn test_create_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        fs::write(&path, b"junk").unwrap();
        let (dsm, bpm) = setup(BITS_PER_PAGE);

        dsm.create_database(&bpm, &path, 10).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 10 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_create_reserves_header_and_map_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let (dsm, bpm) = setup(8);

        // 20 pages at 8 bits per map page: map pages 1..=3
        dsm.create_database(&bpm, &path, 20).unwrap();

        for p in 0..=3 {
            assert!(dsm.is_allocated(&bpm, PageId::new(p)).unwrap());
        }
        assert!(!dsm.is_allocated(&bpm, PageId::new(4)).unwrap());
    }

    #[test]
    fn test_lifecycle_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let (dsm, bpm) = setup(BITS_PER_PAGE);

        assert!(matches!(dsm.num_pages(), Err(Error::DatabaseNotOpen)));
        assert!(matches!(dsm.close_database(), Err(Error::DatabaseNotOpen)));

        dsm.create_database(&bpm, &path, 10).unwrap();
        assert!(matches!(
            dsm.create_database(&bpm, &path, 10),
            Err(Error::DatabaseAlreadyOpen)
        ));
        assert!(matches!(
            dsm.open_database(&bpm, &path),
            Err(Error::DatabaseAlreadyOpen)
        ));

        dsm.close_database().unwrap();
        assert!(!dsm.is_open());
    }

    #[test]
    fn test_read_write_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let (dsm, bpm) = setup(BITS_PER_PAGE);
        dsm.create_database(&bpm, &path, 4).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[100] = 0xCD;
        dsm.write_page(PageId::new(3), &page).unwrap();

        let mut read = Page::new();
        dsm.read_page(PageId::new(3), &mut read).unwrap();
        assert_eq!(read.as_slice()[100], 0xCD);

        assert!(matches!(
            dsm.read_page(PageId::new(4), &mut read),
            Err(Error::InvalidPageNumber(p)) if p == PageId::new(4)
        ));
        assert!(matches!(
            dsm.write_page(PageId::INVALID, &page),
            Err(Error::InvalidPageNumber(_))
        ));

        dsm.check_page(PageId::new(3)).unwrap();
        assert!(matches!(
            dsm.check_page(PageId::new(4)),
            Err(Error::InvalidPageNumber(_))
        ));
    }

    #[test]
    fn test_open_recovers_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let (dsm, bpm) = setup(BITS_PER_PAGE);
            dsm.create_database(&bpm, &path, 42).unwrap();
            bpm.flush_all().unwrap();
            dsm.close_database().unwrap();
        }

        let (dsm, bpm) = setup(BITS_PER_PAGE);
        dsm.open_database(&bpm, &path).unwrap();
        assert_eq!(dsm.num_pages().unwrap(), 42);
    }

    #[test]
    fn test_open_rejects_corrupt_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.db");

        // Header records more pages than the file holds
        let mut page = Page::new();
        page.write_u32(PAGE_SIZE - 4, 1000);
        let mut bytes = page.as_slice().to_vec();
        bytes.extend_from_slice(&[0u8; PAGE_SIZE]);
        fs::write(&path, bytes).unwrap();

        let (dsm, bpm) = setup(BITS_PER_PAGE);
        assert!(matches!(
            dsm.open_database(&bpm, &path),
            Err(Error::CorruptHeader(_))
        ));
        assert!(!dsm.is_open());
    }

    #[test]
    fn test_open_rejects_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.db");
        fs::write(&path, [0u8; 100]).unwrap();

        let (dsm, bpm) = setup(BITS_PER_PAGE);
        assert!(matches!(
            dsm.open_database(&bpm, &path),
            Err(Error::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_destroy_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let (dsm, bpm) = setup(BITS_PER_PAGE);

        dsm.create_database(&bpm, &path, 10).unwrap();
        dsm.destroy_database().unwrap();

        assert!(!path.exists());
        assert!(matches!(dsm.destroy_database(), Err(Error::DatabaseNotOpen)));
    }

    #[test]
    #[should_panic(expected = "bits_per_map_page out of range")]
    fn test_new_rejects_bad_density() {
        DiskSpaceManager::new(4);
    }
}
