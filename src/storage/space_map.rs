//! Space map: one bit per page, stored on pages `1..=m`.
//!
//! Page `p` is tracked on map page `1 + p / bpp`, byte `(p % bpp) / 8`,
//! bit `(p % bpp) % 8` (least significant first), where `bpp` is the
//! manager's bits per map page. A set bit means allocated.

use log::debug;

use super::DiskSpaceManager;
use crate::buffer::{PagePool, PageReadGuard, PageWriteGuard, PinMode};
use crate::common::{Error, PageId, Result};

/// Bits per group in [`DiskSpaceManager::dump_space_map`].
const DUMP_GROUP: u32 = 10;

/// Bits per line in [`DiskSpaceManager::dump_space_map`].
const DUMP_LINE: u32 = 50;

#[inline]
fn bit_is_set(bytes: &[u8], offset: usize) -> bool {
    bytes[offset / 8] & (1 << (offset % 8)) != 0
}

impl DiskSpaceManager {
    /// Map page and in-page bit offset tracking page `page`.
    #[inline]
    fn map_location(&self, page: u32) -> (PageId, usize) {
        let bpp = self.bits_per_map_page;
        (PageId::new(1 + page / bpp), (page % bpp) as usize)
    }

    /// Allocate `run_size` contiguous pages and return the first.
    ///
    /// First fit: map pages are scanned in order and the first run of free
    /// pages long enough wins. Runs may span map pages.
    ///
    /// # Errors
    /// - `Error::InvalidRunSize` if `run_size` is 0 or more than the database
    /// - `Error::OutOfSpace` if no free run is long enough; nothing changes
    pub fn allocate_run(&self, pool: &dyn PagePool, run_size: u32) -> Result<PageId> {
        let num_pages = self.num_pages()?;
        if run_size == 0 || run_size > num_pages {
            return Err(Error::InvalidRunSize(run_size));
        }

        let bpp = self.bits_per_map_page;
        let mut run_start = 0u32;
        let mut run_len = 0u32;
        let mut found = None;

        'scan: for map in 0..self.num_map_pages(num_pages) {
            let guard = PageReadGuard::pin(pool, PageId::new(1 + map))?;
            let first = map * bpp;
            let last = (first + bpp).min(num_pages);

            for page in first..last {
                if bit_is_set(guard.as_slice(), (page - first) as usize) {
                    run_start = page + 1;
                    run_len = 0;
                } else {
                    run_len += 1;
                    if run_len == run_size {
                        found = Some(run_start);
                        break 'scan;
                    }
                }
            }
        }

        let start = found.ok_or(Error::OutOfSpace {
            requested: run_size,
        })?;
        self.set_bits(pool, start, run_size, true)?;

        debug!("space map: allocated pages {}..{}", start, start + run_size);
        Ok(PageId::new(start))
    }

    /// Mark `run_size` pages starting at `start` free.
    ///
    /// A run of 0 pages changes nothing once `start` has been checked.
    ///
    /// # Errors
    /// `Error::InvalidPageNumber` if the run extends past the database.
    pub fn deallocate_run(&self, pool: &dyn PagePool, start: PageId, run_size: u32) -> Result<()> {
        self.set_bits(pool, start.0, run_size, false)?;
        debug!("space map: freed pages {}..{}", start.0, start.0 as u64 + run_size as u64);
        Ok(())
    }

    /// Whether `page_id` is marked allocated.
    ///
    /// # Errors
    /// `Error::InvalidPageNumber` if `page_id` is out of range.
    pub fn is_allocated(&self, pool: &dyn PagePool, page_id: PageId) -> Result<bool> {
        if page_id.0 >= self.num_pages()? {
            return Err(Error::InvalidPageNumber(page_id));
        }

        let (map_page, offset) = self.map_location(page_id.0);
        let guard = PageReadGuard::pin(pool, map_page)?;
        Ok(bit_is_set(guard.as_slice(), offset))
    }

    /// Set or clear the bits of `run_size` pages starting at `start`.
    ///
    /// Every map page the run touches is pinned, in page order, before any
    /// bit changes. If one of those pins fails the map is left as it was.
    /// A run therefore needs one free frame per map page it spans.
    pub(crate) fn set_bits(
        &self,
        pool: &dyn PagePool,
        start: u32,
        run_size: u32,
        allocated: bool,
    ) -> Result<()> {
        let num_pages = self.num_pages()?;
        if start as u64 + run_size as u64 > num_pages as u64 {
            return Err(Error::InvalidPageNumber(PageId::new(start)));
        }
        if run_size == 0 {
            return Ok(());
        }

        let bpp = self.bits_per_map_page;
        let end = start + run_size;
        let first_map = start / bpp;
        let last_map = (end - 1) / bpp;

        let mut guards = Vec::with_capacity((last_map - first_map + 1) as usize);
        for map in first_map..=last_map {
            guards.push(PageWriteGuard::pin(pool, PageId::new(1 + map), PinMode::Read)?);
        }

        for (map, guard) in (first_map..=last_map).zip(guards.iter_mut()) {
            let bytes = guard.as_mut_slice();
            for p in start.max(map * bpp)..end.min((map + 1) * bpp) {
                let offset = (p % bpp) as usize;
                let mask = 1u8 << (offset % 8);
                if allocated {
                    bytes[offset / 8] |= mask;
                } else {
                    bytes[offset / 8] &= !mask;
                }
            }
        }
        Ok(())
    }

    /// Render the space map, one character per page.
    ///
    /// Lines hold 50 pages in groups of 10 and start with the number of
    /// their first page. The rendering is also logged at debug level.
    pub fn dump_space_map(&self, pool: &dyn PagePool) -> Result<String> {
        let num_pages = self.num_pages()?;
        let bpp = self.bits_per_map_page;
        let mut out = String::new();

        for map in 0..self.num_map_pages(num_pages) {
            let guard = PageReadGuard::pin(pool, PageId::new(1 + map))?;
            let first = map * bpp;
            let last = (first + bpp).min(num_pages);

            for page in first..last {
                if page % DUMP_LINE == 0 {
                    if page > 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("{:>6}: ", page));
                } else if page % DUMP_GROUP == 0 {
                    out.push(' ');
                }
                let set = bit_is_set(guard.as_slice(), (page - first) as usize);
                out.push(if set { '1' } else { '0' });
            }
        }
        out.push('\n');

        debug!("space map of {} pages:\n{}", num_pages, out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::testing::FailingPool;
    use crate::buffer::BufferPoolManager;
    use crate::common::config::BITS_PER_PAGE;
    use tempfile::{tempdir, TempDir};

    fn setup(num_pages: u32, bits: usize) -> (TempDir, Arc<DiskSpaceManager>, BufferPoolManager) {
        let dir = tempdir().unwrap();
        let dsm = Arc::new(DiskSpaceManager::new(bits));
        let bpm = BufferPoolManager::new(8, dsm.clone());
        dsm.create_database(&bpm, dir.path().join("map.db"), num_pages)
            .unwrap();
        (dir, dsm, bpm)
    }

    #[test]
    fn test_allocate_first_fit() {
        let (_dir, dsm, bpm) = setup(100, BITS_PER_PAGE);

        // Page 0 and map page 1 are reserved
        assert_eq!(dsm.allocate_run(&bpm, 5).unwrap(), PageId::new(2));
        assert_eq!(dsm.allocate_run(&bpm, 3).unwrap(), PageId::new(7));

        dsm.deallocate_run(&bpm, PageId::new(2), 5).unwrap();
        // A run of 6 doesn't fit in the hole at 2..7
        assert_eq!(dsm.allocate_run(&bpm, 6).unwrap(), PageId::new(10));
        assert_eq!(dsm.allocate_run(&bpm, 5).unwrap(), PageId::new(2));
    }

    #[test]
    fn test_allocate_round_trip() {
        let (_dir, dsm, bpm) = setup(50, BITS_PER_PAGE);

        let start = dsm.allocate_run(&bpm, 4).unwrap();
        for p in start.0..start.0 + 4 {
            assert!(dsm.is_allocated(&bpm, PageId::new(p)).unwrap());
        }

        dsm.deallocate_run(&bpm, start, 4).unwrap();
        for p in start.0..start.0 + 4 {
            assert!(!dsm.is_allocated(&bpm, PageId::new(p)).unwrap());
        }
    }

    #[test]
    fn test_allocate_across_map_pages() {
        // 8 bits per map page, 40 pages: map pages 1..=5, pages 0..=5 reserved
        let (_dir, dsm, bpm) = setup(40, 8);

        let start = dsm.allocate_run(&bpm, 10).unwrap();
        assert_eq!(start, PageId::new(6));
        for p in 6..16 {
            assert!(dsm.is_allocated(&bpm, PageId::new(p)).unwrap());
        }
        assert!(!dsm.is_allocated(&bpm, PageId::new(16)).unwrap());
    }

    #[test]
    fn test_run_restarts_after_allocated_page() {
        let (_dir, dsm, bpm) = setup(40, 8);

        // Pin a single page in the middle of the free space
        dsm.set_bits(&bpm, 10, 1, true).unwrap();
        // 6..10 is only 4 long
        assert_eq!(dsm.allocate_run(&bpm, 5).unwrap(), PageId::new(11));
        assert_eq!(dsm.allocate_run(&bpm, 4).unwrap(), PageId::new(6));
    }

    #[test]
    fn test_invalid_run_size() {
        let (_dir, dsm, bpm) = setup(20, BITS_PER_PAGE);

        assert!(matches!(
            dsm.allocate_run(&bpm, 0),
            Err(Error::InvalidRunSize(0))
        ));
        assert!(matches!(
            dsm.allocate_run(&bpm, 21),
            Err(Error::InvalidRunSize(21))
        ));
    }

    #[test]
    fn test_out_of_space_changes_nothing() {
        let (_dir, dsm, bpm) = setup(20, BITS_PER_PAGE);

        // 18 free pages after the header and one map page
        let before = dsm.dump_space_map(&bpm).unwrap();
        assert!(matches!(
            dsm.allocate_run(&bpm, 19),
            Err(Error::OutOfSpace { requested: 19 })
        ));
        assert_eq!(dsm.dump_space_map(&bpm).unwrap(), before);

        assert_eq!(dsm.allocate_run(&bpm, 18).unwrap(), PageId::new(2));
        assert!(matches!(
            dsm.allocate_run(&bpm, 1),
            Err(Error::OutOfSpace { requested: 1 })
        ));
    }

    #[test]
    fn test_deallocate_bounds() {
        let (_dir, dsm, bpm) = setup(20, BITS_PER_PAGE);

        assert!(matches!(
            dsm.deallocate_run(&bpm, PageId::new(18), 3),
            Err(Error::InvalidPageNumber(_))
        ));
        dsm.deallocate_run(&bpm, PageId::new(5), 0).unwrap();
        assert!(matches!(
            dsm.deallocate_run(&bpm, PageId::INVALID, 0),
            Err(Error::InvalidPageNumber(_))
        ));
    }

    #[test]
    fn test_dump_format() {
        let (_dir, dsm, bpm) = setup(60, BITS_PER_PAGE);
        dsm.allocate_run(&bpm, 12).unwrap();

        let dump = dsm.dump_space_map(&bpm).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "     0: 1111111111 1111000000 0000000000 0000000000 0000000000"
        );
        assert_eq!(lines[1], "    50: 0000000000");
    }

    #[test]
    fn test_failed_pin_leaves_map_unchanged() {
        // 8 bits per map page, 40 pages: a run of 10 at page 6 spans map pages 1 and 2
        let (_dir, dsm, bpm) = setup(40, 8);
        let before = dsm.dump_space_map(&bpm).unwrap();

        let mut map2_pins = 0;
        let pool = FailingPool::new(&bpm, |page_id, _| {
            if page_id == PageId::new(2) {
                map2_pins += 1;
                // First pin is the scan, second is the bit update
                (map2_pins == 2).then_some(Error::BufferPoolExceeded)
            } else {
                None
            }
        });

        assert!(matches!(
            dsm.allocate_run(&pool, 10),
            Err(Error::BufferPoolExceeded)
        ));
        assert_eq!(dsm.dump_space_map(&bpm).unwrap(), before);
        assert_eq!(bpm.num_unpinned(), bpm.num_buffers());

        assert_eq!(dsm.allocate_run(&bpm, 10).unwrap(), PageId::new(6));
    }

    #[test]
    fn test_failed_pin_keeps_run_allocated() {
        let (_dir, dsm, bpm) = setup(40, 8);
        let start = dsm.allocate_run(&bpm, 10).unwrap();
        let before = dsm.dump_space_map(&bpm).unwrap();

        let pool = FailingPool::new(&bpm, |page_id, _| {
            (page_id == PageId::new(2)).then_some(Error::BufferPoolExceeded)
        });
        assert!(matches!(
            dsm.deallocate_run(&pool, start, 10),
            Err(Error::BufferPoolExceeded)
        ));
        assert_eq!(dsm.dump_space_map(&bpm).unwrap(), before);
    }

    #[test]
    fn test_space_map_pins_released() {
        let (_dir, dsm, bpm) = setup(40, 8);

        dsm.allocate_run(&bpm, 10).unwrap();
        dsm.dump_space_map(&bpm).unwrap();

        assert_eq!(bpm.num_unpinned(), bpm.num_buffers());
    }
}
