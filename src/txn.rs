//! Transaction - a unit of work against one store.
//!
//! A transaction pins the pages it reads through the pool and takes
//! ownership of every page it declares it will modify. Ownership keeps the
//! page cached and out of reach of write-back until the transaction ends:
//!
//! ```text
//!              will_modify                      commit
//!   init txn ──────────────▶ writer txn ───────────────────▶ init txn
//!   (clean)                  (dirty, pinned)   write-back     (clean)
//!                                 │
//!                                 │ rollback
//!                                 ▼
//!                            discarded (re-read from the file on next fetch)
//! ```
//!
//! Pages a transaction frees are collected in a private free page list and
//! only join the store-wide list when it commits.

use std::cell::{Cell, RefCell};

use tracing::{debug, error, info, warn};

use crate::buffer::{FetchMode, PageGuard};
use crate::common::{Error, PageId, Result, TxnId};
use crate::storage::FreePageList;
use crate::store::Store;

/// Lifecycle of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Open,
    Committed,
    RolledBack,
}

/// A unit of work against one [`Store`].
///
/// Dropping an open transaction rolls it back. A transaction is also rolled
/// back when its store closes; every later call then fails with
/// [`Error::AlreadyClosed`].
pub struct Transaction {
    store: Store,
    id: TxnId,
    status: Cell<TxnStatus>,

    /// Pages freed by this transaction, published on commit.
    free_pages: RefCell<FreePageList>,

    /// Set once a page was taken from the store-wide free list, whose new
    /// head must then be recorded on commit.
    touched_store_free_list: Cell<bool>,
}

impl Transaction {
    pub(crate) fn new(store: Store, id: TxnId) -> Self {
        Self {
            store,
            id,
            status: Cell::new(TxnStatus::Open),
            free_pages: RefCell::new(FreePageList::new()),
            touched_store_free_list: Cell::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// The store this transaction works on.
    #[inline]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Current status. A transaction whose store was closed under it
    /// reports `RolledBack`.
    pub fn status(&self) -> TxnStatus {
        match self.status.get() {
            TxnStatus::Open if !self.store.inner().is_txn_live(self.id) => TxnStatus::RolledBack,
            status => status,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == TxnStatus::Open
    }

    fn check_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::AlreadyClosed)
        }
    }

    // ========================================================================
    // Pages
    // ========================================================================

    /// Pin `page_id` of this transaction's store.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the transaction or its store is closed
    /// - Any error from [`PagePool::fetch`](crate::PagePool::fetch)
    pub fn fetch(&self, page_id: PageId, mode: FetchMode) -> Result<PageGuard<'_>> {
        self.check_open()?;
        self.store.pool().fetch(&self.store, page_id, mode)
    }

    /// Declare that the caller is about to change `page`'s bytes.
    ///
    /// Takes ownership of the page for this transaction and marks it dirty.
    /// The page stays cached until the transaction commits or rolls back.
    /// Calling it again for a page already owned only re-marks it dirty.
    ///
    /// # Errors
    /// `Error::AlreadyClosed` if the transaction or its store is closed.
    ///
    /// # Panics
    /// Panics if `page` does not cache a page of this transaction's store.
    pub fn will_modify(&self, page: &PageGuard<'_>) -> Result<()> {
        self.check_open()?;
        assert_eq!(
            page.store_id(),
            Some(self.store.id()),
            "will_modify on a page of another store"
        );
        self.store.pool().will_modify(page.frame_id(), self.id);
        Ok(())
    }

    /// Number of pages this transaction currently owns.
    pub fn owned_page_count(&self) -> usize {
        self.store.pool().owned_count(self.id)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Reserve a page id for this transaction's use.
    ///
    /// Pages freed earlier by this transaction come first, then the
    /// store-wide free list, then a new page past the end of the file. The
    /// page's contents are unspecified; see [`create_page`](Self::create_page).
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the transaction or its store is closed
    /// - `Error::DatabaseTooLarge` if the file cannot grow any further
    /// - `Error::DataCorrupted` if a free page list is malformed
    /// - `Error::AlreadyLocked` if the store-wide free list has uncommitted
    ///   changes from another live transaction. Only one transaction at a
    ///   time may take from it or publish to it.
    pub fn allocate_page(&self) -> Result<PageId> {
        self.check_open()?;

        if let Some(page_id) = self.free_pages.borrow_mut().pop(self)? {
            debug!(txn = %self.id, page = %page_id, source = "txn", "txn.allocate");
            return Ok(page_id);
        }

        if let Some(page_id) = self.store.pop_free_page(self)? {
            self.touched_store_free_list.set(true);
            debug!(txn = %self.id, page = %page_id, source = "store", "txn.allocate");
            return Ok(page_id);
        }

        let page_id = self.store.extend()?;
        debug!(txn = %self.id, page = %page_id, source = "extend", "txn.allocate");
        Ok(page_id)
    }

    /// Allocate a page and return it pinned, owned and zeroed.
    pub fn create_page(&self) -> Result<PageGuard<'_>> {
        let page_id = self.allocate_page()?;
        let mut page = self.fetch(page_id, FetchMode::IgnoreData)?;
        self.will_modify(&page)?;
        page.data_mut().reset();
        Ok(page)
    }

    /// Give `page_id` back. It becomes reusable by this transaction at once
    /// and by others once this transaction commits.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the transaction or its store is closed
    /// - Any error writing this transaction's free page list
    ///
    /// # Panics
    /// Panics if `page_id` is the header page.
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        self.check_open()?;
        self.free_pages.borrow_mut().push(self, page_id)?;
        debug!(txn = %self.id, page = %page_id, "txn.free");
        Ok(())
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Make every change durable and end the transaction.
    ///
    /// Freed pages are merged into the store-wide free list, every owned
    /// page is written back and handed to the store's init transaction, and
    /// the data file is synced.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the transaction or its store is closed
    /// - `Error::AlreadyLocked` if pages were freed while another live
    ///   transaction holds uncommitted changes to the store-wide free list
    /// - Any error merging the free lists or writing pages. The transaction
    ///   is rolled back and the store's free list is left as it was.
    /// - Any I/O error writing back or syncing pages. The store is closed as
    ///   well, since pages of the failed commit may already be written.
    pub fn commit(self) -> Result<()> {
        self.check_open()?;

        match self.persist() {
            Ok(pages) => {
                self.finish(TxnStatus::Committed);
                info!(store = %self.store.id(), txn = %self.id, pages, "txn.commit");
                Ok(())
            }
            Err(err) => {
                self.store.inner().discard_pages_of(self.id);
                self.finish(TxnStatus::RolledBack);
                warn!(store = %self.store.id(), txn = %self.id, error = %err, "txn.commit_failed");
                Err(err)
            }
        }
    }

    /// Returns the number of pages handed back to the init transaction.
    fn persist(&self) -> Result<usize> {
        let local = self.free_pages.take();
        if !local.is_empty() || self.touched_store_free_list.get() {
            self.store.publish_free_list(self, local)?;
        }

        let inner = self.store.inner();
        let frames = self.store.pool().owned_frames(self.id);
        for &frame in &frames {
            self.store.pool().persist_frame(frame, self.id, inner)?;
        }
        // The pages are already handed to init; without the sync they
        // cannot stay visible.
        if let Err(err) = inner.sync() {
            error!(store = %self.store.id(), txn = %self.id, error = %err, "txn.sync_failed");
            inner.close_after_write_failure();
            return Err(err);
        }
        Ok(frames.len())
    }

    /// Throw away every change and end the transaction.
    ///
    /// # Errors
    /// `Error::AlreadyClosed` if the transaction or its store is closed.
    pub fn rollback(self) -> Result<()> {
        self.check_open()?;
        self.abort();
        Ok(())
    }

    fn abort(&self) {
        let pages = self.owned_page_count();
        self.store.inner().discard_pages_of(self.id);
        self.free_pages.take();
        self.finish(TxnStatus::RolledBack);
        info!(store = %self.store.id(), txn = %self.id, pages, "txn.rollback");
    }

    /// Record the final status and leave the store's live set.
    fn finish(&self, status: TxnStatus) {
        self.status.set(status);
        self.store.inner().end_txn(self.id);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_open() {
            self.abort();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("store", &self.store.id())
            .field("status", &self.status())
            .finish()
    }
}
