//! Error types for pagekeeper.

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in the storage layer.
///
/// One variant per failure kind. Every failure is returned to the caller of
/// the operation that triggered it; nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Page id outside `[0, num_pages)`, or a run reaching past the end.
    #[error("invalid page number: {0}")]
    InvalidPageNumber(PageId),

    /// A non-resident page was requested while every frame is pinned.
    #[error("buffer pool exceeded: every frame is pinned")]
    BufferPoolExceeded,

    /// Unpin or flush of a page that is not in the buffer pool.
    #[error("{0} is not in the buffer pool")]
    PageNotFound(PageId),

    /// Unpin of a page whose pin count is already 0.
    ///
    /// This indicates a bug in the caller: unpins must match pins.
    #[error("{0} is already unpinned")]
    PageAlreadyUnpinned(PageId),

    /// Free of a page that is still pinned.
    #[error("{0} is still pinned")]
    PagePinned(PageId),

    /// Run size outside `[1, num_pages]` for an allocation.
    #[error("invalid run size: {0}")]
    InvalidRunSize(u32),

    /// No contiguous free run of the requested length exists.
    #[error("out of space: no free run of {requested} pages")]
    OutOfSpace { requested: u32 },

    /// File-entry name is `NAME_MAXLEN` bytes or longer.
    #[error("file name too long: {0:?}")]
    FileNameTooLong(String),

    /// A file entry with this name already exists.
    #[error("duplicate file entry: {0:?}")]
    DuplicateEntry(String),

    /// No file entry with this name exists.
    #[error("file entry not found: {0:?}")]
    FileEntryNotFound(String),

    /// Underlying storage I/O failure (open, seek, read, write).
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    /// Page I/O or directory operation on a closed database.
    #[error("database is not open")]
    DatabaseNotOpen,

    /// Create or open on a database handle that is already open.
    #[error("database is already open")]
    DatabaseAlreadyOpen,

    /// The first header page or the directory chain is malformed.
    #[error("corrupt database header: {0}")]
    CorruptHeader(String),

    /// A [`StorageConfig`](crate::StorageConfig) failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) is not in the buffer pool");

        let err = Error::BufferPoolExceeded;
        assert_eq!(
            format!("{}", err),
            "buffer pool exceeded: every frame is pinned"
        );

        let err = Error::OutOfSpace { requested: 7 };
        assert_eq!(format!("{}", err), "out of space: no free run of 7 pages");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::FileIo(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected FileIo error"),
        }
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;

        let err: Error = std::io::Error::other("disk on fire").into();
        assert!(err.source().is_some());
        assert!(Error::BufferPoolExceeded.source().is_none());
    }
}
