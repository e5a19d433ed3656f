//! Storage layer - file collaborators and on-disk page formats.
//!
//! This module handles persistent storage:
//! - [`BlockFile`] / [`RandomAccessFile`] - File interfaces consumed by stores
//! - [`DiskFile`] / [`MemoryFile`] - Their `std::fs` and in-memory implementations
//! - [`Page`] - The byte buffer behind one pool entry
//! - [`StoreHeader`] - Page 0 of every store
//! - [`FreePageList`] - Reclaimed pages, stored inside the pages themselves

mod block_file;
mod disk_file;
mod free_list;
pub mod free_list_format;
pub mod header;
mod memory_file;
mod page;

pub use block_file::{BlockFile, RandomAccessFile};
pub use disk_file::DiskFile;
pub use free_list::FreePageList;
pub use header::StoreHeader;
pub use memory_file::MemoryFile;
pub use page::Page;
