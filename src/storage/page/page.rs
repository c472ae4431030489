//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw byte array that serves as the unit of I/O between
//! disk and memory. The storage layer gives it no structure of its own;
//! typed views such as [`HeaderPage`](super::HeaderPage) and the space-map
//! helpers interpret the bytes.

use crate::common::config::PAGE_SIZE;

/// A page of data (4KB, 4KB-aligned).
///
/// # Memory Layout
/// - Size: [`PAGE_SIZE`] bytes
/// - Alignment: 4096 bytes
///
/// # Clone Implementation
/// `Page` does not implement `Clone` outside tests; copying 4KB should be
/// explicit (see [`Page::copy_from`]).
///
/// # Example
/// ```
/// use pagekeeper::Page;
///
/// let mut page = Page::new();
/// page.write_u32(8, 0xDEAD_BEEF);
/// assert_eq!(page.read_u32(8), 0xDEAD_BEEF);
/// ```
#[derive(Debug)]
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the contents of another.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Read a little-endian `u32` at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + 4 > PAGE_SIZE`.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    /// Write a little-endian `u32` at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + 4 > PAGE_SIZE`.
    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}
