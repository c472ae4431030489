//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between callers and the database
//! file. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The main page cache
//! - [`PagePool`] - The pin/unpin capability the space manager calls back into
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool_manager;
mod frame;
mod page_guard;
mod pool;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{Frame, FrameDescriptor};
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use pool::{PagePool, PinMode};
#[cfg(test)]
pub(crate) use pool::testing;
pub use stats::{BufferPoolStats, StatsSnapshot};
