//! Configuration for pagekeeper.
//!
//! Layout constants are fixed at build time because they define the on-disk
//! format. Everything that can vary per database handle lives in
//! [`StorageConfig`].

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 - 1 (`u32::MAX` is reserved as the invalid id)
/// - Max database size: just under 16TB
pub const PAGE_SIZE: usize = 4096;

/// Number of space-map bits one full map page holds.
pub const BITS_PER_PAGE: usize = PAGE_SIZE * 8;

/// Maximum length of a file-entry name. Names must be strictly shorter.
pub const NAME_MAXLEN: usize = 50;

/// A database always has at least the first header page and one map page.
pub const MIN_DB_PAGES: u32 = 2;

/// Frames in the buffer pool when the caller does not choose.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Eviction policy used by the buffer pool.
///
/// Only FIFO ships. New policies plug in by implementing
/// [`Replacer`](crate::buffer::replacer::Replacer) and adding a variant here.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Evict the frame that has been unpinned the longest.
    #[default]
    Fifo,
}

/// Runtime settings for a [`Database`](crate::Database) handle.
///
/// # Example
/// ```
/// use pagekeeper::StorageConfig;
///
/// let config = StorageConfig::default().with_pool_size(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,

    /// Which replacer the pool is built with.
    pub replacement: ReplacementPolicy,

    /// How many page bits each space-map page holds.
    ///
    /// Defaults to [`BITS_PER_PAGE`]. Lowering it packs fewer bits per map
    /// page, which lets small test databases span several map pages. The
    /// value must be recorded alongside the file: opening a database with a
    /// different density misreads its space map.
    pub bits_per_map_page: usize,
}

impl StorageConfig {
    /// Set the number of frames.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the replacement policy.
    pub fn with_replacement(mut self, replacement: ReplacementPolicy) -> Self {
        self.replacement = replacement;
        self
    }

    /// Set the space-map density.
    pub fn with_bits_per_map_page(mut self, bits: usize) -> Self {
        self.bits_per_map_page = bits;
        self
    }

    /// Check the settings before a handle is built from them.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the pool is empty or the map density is
    /// outside `8..=BITS_PER_PAGE`.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.bits_per_map_page < 8 || self.bits_per_map_page > BITS_PER_PAGE {
            return Err(Error::InvalidConfig(format!(
                "bits_per_map_page must be in 8..={}, got {}",
                BITS_PER_PAGE, self.bits_per_map_page
            )));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            replacement: ReplacementPolicy::Fifo,
            bits_per_map_page: BITS_PER_PAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(BITS_PER_PAGE, 32768);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.replacement, ReplacementPolicy::Fifo);
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = StorageConfig::default().with_pool_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_map_density_bounds() {
        let base = StorageConfig::default();
        assert!(base.clone().with_bits_per_map_page(8).validate().is_ok());
        assert!(base.clone().with_bits_per_map_page(7).validate().is_err());
        assert!(base
            .with_bits_per_map_page(BITS_PER_PAGE + 8)
            .validate()
            .is_err());
    }
}
