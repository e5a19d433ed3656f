//! LarchDB - the storage-engine core of an embedded key-value store.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            LarchDB                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Transactions (txn.rs)                      │    │
//! │  │   fetch → will_modify → commit | rollback               │    │
//! │  │   allocate_page / free_page  (private FreePageList)     │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Stores (store.rs)                          │    │
//! │  │   header + bootstrap, store-wide FreePageList,          │    │
//! │  │   live transactions, close cascade                      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Page Pool (buffer/)                        │    │
//! │  │   PagePool + PageGuard + Frame, strict LRU,             │    │
//! │  │   per-transaction ownership lists, statistics           │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Storage (storage/)                         │    │
//! │  │   BlockFile: DiskFile | MemoryFile, Page,               │    │
//! │  │   StoreHeader, free list page format                    │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, Error, options)
//! - [`buffer`] - The page pool
//! - [`storage`] - Files and on-disk page formats
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use larchdb::{PagePool, PoolOptions, Store, StoreOptions};
//!
//! let pool = Arc::new(PagePool::new(PoolOptions::default()).unwrap());
//! let store = Store::open_path(&pool, "my_store.db", &StoreOptions::default()).unwrap();
//!
//! let txn = store.begin().unwrap();
//! let mut page = txn.create_page().unwrap();
//! page.data_mut().as_mut_slice()[..5].copy_from_slice(b"hello");
//! page.release().unwrap();
//! txn.commit().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

mod store;
mod txn;

// Re-export commonly used items at crate root for convenience
pub use common::config::{PoolOptions, StoreOptions};
pub use common::{Error, FrameId, PageId, Result, StoreId, TxnId};

pub use buffer::{FetchMode, PageGuard, PageKey, PagePool, PoolStats, StatsSnapshot};
pub use storage::{
    BlockFile, DiskFile, FreePageList, MemoryFile, Page, RandomAccessFile, StoreHeader,
};
pub use store::Store;
pub use txn::{Transaction, TxnStatus};
