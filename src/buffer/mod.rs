//! Page pool management.
//!
//! The page pool is the in-memory cache layer between transactions and
//! store data files. It manages a bounded set of entries, each caching one
//! page of one store.
//!
//! # Components
//! - [`PagePool`] - The page cache, shared by every store opened against it
//! - [`PageGuard`] - RAII pin on one entry
//! - [`PoolStats`] - Performance statistics
//! - `Frame` / `FrameList` - Entry control blocks and the intrusive lists
//!   threading them (free, LRU, per-transaction ownership)

mod frame;
mod frame_list;
mod page_guard;
mod page_pool;
mod stats;

pub use frame::PageKey;
pub use page_guard::PageGuard;
pub use page_pool::{FetchMode, PagePool};
pub use stats::{PoolStats, StatsSnapshot};
