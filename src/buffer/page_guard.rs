//! RAII guard for a pinned pool entry.
//!
//! A [`PageGuard`] is the only way to hold a pool entry. Creating one adds a
//! pin; dropping it removes the pin on every exit path, including early
//! returns with `?`.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

use crate::buffer::PagePool;
use crate::common::{FrameId, PageId, Result, StoreId};
use crate::storage::Page;

/// A pin on one pool entry.
///
/// Multiple guards may pin the same entry. The bytes are reached through
/// [`data`](Self::data) and [`data_mut`](Self::data_mut), which lock the
/// entry's buffer for as long as the returned borrow lives.
///
/// Releasing the last pin on a dirty entry writes it back through its
/// store. A transaction keeps its own pin on every page it modifies, so for
/// those pages that happens when it commits. Dropping the guard logs a
/// failed write-back; [`release`](Self::release) returns it.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use larchdb::{FetchMode, MemoryFile, PagePool, PageId, PoolOptions, Store, StoreOptions};
///
/// let pool = Arc::new(PagePool::new(PoolOptions::new(6, 8)).unwrap());
/// let store = Store::open(&pool, Box::new(MemoryFile::new()), None, &StoreOptions::default()).unwrap();
///
/// let page = pool.fetch(&store, PageId::ROOT, FetchMode::FetchData).unwrap();
/// assert!(page.data().as_slice().iter().all(|&b| b == 0));
/// page.release().unwrap();
/// ```
pub struct PageGuard<'a> {
    pool: &'a PagePool,
    frame_id: FrameId,
}

impl<'a> PageGuard<'a> {
    /// Wrap an entry the pool has just pinned.
    pub(crate) fn new(pool: &'a PagePool, frame_id: FrameId) -> Self {
        Self { pool, frame_id }
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Page cached by this entry, or `None` while unassigned.
    pub fn page_id(&self) -> Option<PageId> {
        self.pool.frame_key(self.frame_id).map(|key| key.page)
    }

    /// Store owning the cached page, or `None` while unassigned.
    pub fn store_id(&self) -> Option<StoreId> {
        self.pool.frame_key(self.frame_id).map(|key| key.store)
    }

    /// True if the entry holds changes not yet written to its store.
    pub fn is_dirty(&self) -> bool {
        self.pool.frame_is_dirty(self.frame_id)
    }

    /// Shared access to the page bytes.
    #[inline]
    pub fn data(&self) -> RwLockReadGuard<'_, Page> {
        self.pool.buffer(self.frame_id).read()
    }

    /// Exclusive access to the page bytes.
    ///
    /// An assigned entry must first be handed to a transaction with
    /// [`Transaction::will_modify`](crate::Transaction::will_modify).
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Page> {
        debug_assert!(
            self.pool.frame_is_writable(self.frame_id),
            "page modified without will_modify"
        );
        self.pool.buffer(self.frame_id).write()
    }

    /// Remove this guard's pin, reporting a failed write-back.
    pub fn release(self) -> Result<()> {
        let pool = self.pool;
        let frame_id = self.frame_id;
        std::mem::forget(self);
        pool.release_frame(frame_id)
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.pool.release_frame(self.frame_id) {
            error!(frame = %self.frame_id, error = %err, "pool.release_failed");
        }
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("frame_id", &self.frame_id)
            .finish()
    }
}
