//! Page types and layouts.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`HeaderPage`] - Typed view over file-directory header pages
//! - [`FileEntry`] - A decoded directory slot

mod header_page;
#[allow(clippy::module_inception)]
mod page;

pub use header_page::{FileEntry, HeaderKind, HeaderPage};
pub use page::Page;
