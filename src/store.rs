//! Store - one data file (plus a reserved log file) opened against a pool.
//!
//! A store owns its file handles, hands out transactions, bootstraps new
//! data files, and gives the page pool read and write access to its pages.
//! Closing a store rolls back every live transaction and drops every page
//! it has in the pool.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::buffer::{FetchMode, PagePool};
use crate::common::config::StoreOptions;
use crate::common::{Error, PageId, Result, StoreId, TxnId};
use crate::storage::{BlockFile, DiskFile, FreePageList, Page, RandomAccessFile, StoreHeader};
use crate::txn::Transaction;

/// Mutable bookkeeping that is never held across a pool call.
#[derive(Debug, Default)]
struct StoreState {
    /// Open transactions, in creation order.
    live_txns: BTreeSet<TxnId>,

    /// Number of pages the data file holds or has handed out.
    page_count: u64,

    /// Transaction whose pages hold uncommitted changes to the store-wide
    /// free list.
    free_list_writer: Option<TxnId>,
}

pub(crate) struct StoreInner {
    id: StoreId,
    init_txn: TxnId,
    pool: Arc<PagePool>,

    data_file: Mutex<Box<dyn BlockFile>>,
    log_file: Mutex<Option<Box<dyn RandomAccessFile>>>,

    closed: AtomicBool,
    needs_sync: AtomicBool,

    /// The store-wide free page list. May be held across pool calls, so
    /// `close` never takes it.
    free_list: Mutex<FreePageList>,

    state: Mutex<StoreState>,
}

impl StoreInner {
    #[inline]
    pub(crate) fn id(&self) -> StoreId {
        self.id
    }

    #[inline]
    pub(crate) fn init_txn(&self) -> TxnId {
        self.init_txn
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn page_offset(&self, page_id: PageId) -> Result<u64> {
        page_id
            .0
            .checked_mul(self.pool.page_size() as u64)
            .ok_or(Error::DatabaseTooLarge)
    }

    /// Fill `page` with the bytes of `page_id`.
    pub(crate) fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = self.page_offset(page_id)?;
        self.data_file.lock().read(offset, page.as_mut_slice())
    }

    /// Write `page` as the bytes of `page_id`.
    pub(crate) fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = self.page_offset(page_id)?;
        self.data_file.lock().write(page.as_slice(), offset)?;
        self.needs_sync.store(true, Ordering::Release);
        Ok(())
    }

    /// Make every page written so far durable.
    pub(crate) fn sync(&self) -> Result<()> {
        if !self.needs_sync.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.data_file.lock().sync();
        if result.is_err() {
            self.needs_sync.store(true, Ordering::Release);
        }
        result
    }

    pub(crate) fn is_txn_live(&self, txn: TxnId) -> bool {
        self.state.lock().live_txns.contains(&txn)
    }

    /// Forget `txn`. Returns false if it was not live.
    pub(crate) fn end_txn(&self, txn: TxnId) -> bool {
        let mut state = self.state.lock();
        if state.free_list_writer == Some(txn) {
            state.free_list_writer = None;
        }
        state.live_txns.remove(&txn)
    }

    /// Reserve the store-wide free list's pages for `txn` until it ends.
    ///
    /// # Errors
    /// `Error::AlreadyLocked` if another live transaction changed them.
    fn claim_free_list(&self, txn: TxnId) -> Result<()> {
        let mut state = self.state.lock();
        match state.free_list_writer {
            Some(writer) if writer != txn && state.live_txns.contains(&writer) => {
                Err(Error::AlreadyLocked)
            }
            _ => {
                state.free_list_writer = Some(txn);
                Ok(())
            }
        }
    }

    /// Drop every page `txn` owns, discarding its changes.
    pub(crate) fn discard_pages_of(&self, txn: TxnId) {
        for frame in self.pool.owned_frames(txn) {
            self.pool.discard_frame(frame);
        }
    }

    /// Close the store: roll back live transactions in creation order,
    /// drop the init transaction's pages, then close both files.
    ///
    /// Returns the first error seen; every step runs regardless.
    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyClosed);
        }

        let live = std::mem::take(&mut self.state.lock().live_txns);
        for &txn in &live {
            debug!(store = %self.id, txn = %txn, "store.close.rollback");
            self.discard_pages_of(txn);
        }
        self.discard_pages_of(self.init_txn);
        self.pool.unregister_store(self.id);

        let mut first_error = None;
        if let Err(err) = self.data_file.lock().close() {
            first_error.get_or_insert(err);
        }
        if let Some(mut log) = self.log_file.lock().take() {
            if let Err(err) = log.close() {
                first_error.get_or_insert(err);
            }
        }

        info!(
            store = %self.id,
            rolled_back = live.len(),
            ok = first_error.is_none(),
            "store.close"
        );
        first_error.map_or(Ok(()), Err)
    }

    /// Close after a lost write-back or sync. Every later operation on the store
    /// fails with `AlreadyClosed`.
    pub(crate) fn close_after_write_failure(&self) {
        match self.close() {
            Ok(()) | Err(Error::AlreadyClosed) => {}
            Err(err) => warn!(store = %self.id, error = %err, "store.close_failed"),
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            warn!(store = %self.id, error = %err, "store.drop_close_failed");
        }
    }
}

/// Handle to an open store. Cheap to clone; clones share the store.
///
/// The store stays open until [`close`](Self::close) is called or the last
/// handle (including those held by transactions) is dropped.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use larchdb::{MemoryFile, PagePool, PageId, PoolOptions, Store, StoreOptions};
///
/// let pool = Arc::new(PagePool::new(PoolOptions::new(6, 16)).unwrap());
/// let store = Store::open(&pool, Box::new(MemoryFile::new()), None, &StoreOptions::default()).unwrap();
///
/// let txn = store.begin().unwrap();
/// let page_id = txn.allocate_page().unwrap();
/// assert_eq!(page_id, PageId::new(2));
/// txn.commit().unwrap();
///
/// store.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store over `data_file`, bootstrapping it if the file is empty.
    ///
    /// # Errors
    /// - `Error::NotFound` if the file is empty and `create_if_missing` is off
    /// - `Error::AlreadyExists` if the file holds a store and
    ///   `error_if_exists` is on
    /// - `Error::DataCorrupted` if the header is malformed or records a page
    ///   size other than the pool's
    /// - Any I/O error from the files
    ///
    /// On error both files are closed.
    pub fn open(
        pool: &Arc<PagePool>,
        data_file: Box<dyn BlockFile>,
        log_file: Option<Box<dyn RandomAccessFile>>,
        options: &StoreOptions,
    ) -> Result<Store> {
        let (id, init_txn) = pool.allocate_store_ids();
        let inner = Arc::new(StoreInner {
            id,
            init_txn,
            pool: Arc::clone(pool),
            data_file: Mutex::new(data_file),
            log_file: Mutex::new(log_file),
            closed: AtomicBool::new(false),
            needs_sync: AtomicBool::new(false),
            free_list: Mutex::new(FreePageList::new()),
            state: Mutex::new(StoreState::default()),
        });
        pool.register_store(id, Arc::downgrade(&inner));

        let store = Store { inner };
        match store.initialize(options) {
            Ok(()) => Ok(store),
            Err(err) => {
                warn!(store = %id, error = %err, "store.open_failed");
                if let Err(close_err) = store.inner.close() {
                    debug!(store = %id, error = %close_err, "store.open_failed.close");
                }
                Err(err)
            }
        }
    }

    /// Open the store at `path` with disk files. The log file lives next to
    /// it with a `log` extension.
    pub fn open_path<P: AsRef<Path>>(
        pool: &Arc<PagePool>,
        path: P,
        options: &StoreOptions,
    ) -> Result<Store> {
        let path = path.as_ref();
        let data_file = match DiskFile::open(path) {
            Ok(file) => file,
            Err(Error::NotFound) if options.create_if_missing => DiskFile::create(path)?,
            Err(err) => return Err(err),
        };
        let log_file = DiskFile::open_or_create(path.with_extension("log"))?;

        Self::open(pool, Box::new(data_file), Some(Box::new(log_file)), options)
    }

    fn initialize(&self, options: &StoreOptions) -> Result<()> {
        let page_size = self.inner.pool.page_size() as u64;
        let len = self.inner.data_file.lock().len()?;

        if len == 0 {
            if !options.create_if_missing {
                return Err(Error::NotFound);
            }
            self.bootstrap()?;
        } else {
            if options.error_if_exists {
                return Err(Error::AlreadyExists);
            }
            if len % page_size != 0 {
                return Err(Error::DataCorrupted("data file ends inside a page"));
            }
            self.inner.state.lock().page_count = len / page_size;
        }

        let header = self.read_header()?;
        if header.page_shift != self.inner.pool.page_shift() {
            return Err(Error::DataCorrupted("store page size differs from the pool's"));
        }
        *self.inner.free_list.lock() = FreePageList::with_head(header.free_list_head);

        info!(
            store = %self.inner.id,
            pages = self.page_count(),
            free_list_head = PageId::option_to_disk(header.free_list_head),
            "store.open"
        );
        Ok(())
    }

    /// Write the header page and an empty root page in one transaction.
    fn bootstrap(&self) -> Result<()> {
        self.inner.state.lock().page_count = 2;
        let txn = self.begin()?;

        let mut header = txn.fetch(PageId::HEADER, FetchMode::IgnoreData)?;
        txn.will_modify(&header)?;
        {
            let mut data = header.data_mut();
            data.reset();
            StoreHeader::new(self.inner.pool.page_shift()).serialize(data.as_mut_slice());
        }
        header.release()?;

        let mut root = txn.fetch(PageId::ROOT, FetchMode::IgnoreData)?;
        txn.will_modify(&root)?;
        root.data_mut().reset();
        root.release()?;

        txn.commit()?;
        info!(store = %self.inner.id, "store.bootstrap");
        Ok(())
    }

    // ========================================================================
    // Public API
    // ========================================================================

    /// Identifier of this store within its pool.
    #[inline]
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// The store's init transaction, which owns every cached page not under
    /// modification.
    #[inline]
    pub fn init_txn(&self) -> TxnId {
        self.inner.init_txn
    }

    /// The pool this store caches its pages in.
    #[inline]
    pub fn pool(&self) -> &Arc<PagePool> {
        &self.inner.pool
    }

    /// Page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.inner.pool.page_size()
    }

    /// Number of pages in the store, including pages allocated by
    /// transactions but not written yet.
    pub fn page_count(&self) -> u64 {
        self.inner.state.lock().page_count
    }

    /// True once the store was closed, explicitly or after a failed write.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Head of the store-wide free page list, as last loaded or committed.
    pub fn free_list_head(&self) -> Option<PageId> {
        self.inner.free_list.lock().head()
    }

    /// Read and validate the header on page 0.
    pub fn read_header(&self) -> Result<StoreHeader> {
        let page = self
            .inner
            .pool
            .fetch(self, PageId::HEADER, FetchMode::FetchData)?;
        let header = StoreHeader::deserialize(page.data().as_slice())?;
        page.release()?;
        Ok(header)
    }

    /// Start a transaction.
    ///
    /// # Errors
    /// `Error::AlreadyClosed` if the store is closed.
    pub fn begin(&self) -> Result<Transaction> {
        if self.is_closed() {
            return Err(Error::AlreadyClosed);
        }
        let id = self.inner.pool.next_txn_id();
        self.inner.state.lock().live_txns.insert(id);
        debug!(store = %self.inner.id, txn = %id, "txn.begin");
        Ok(Transaction::new(self.clone(), id))
    }

    /// Close the store, rolling back every live transaction in creation
    /// order and dropping its cached pages.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the store was already closed
    /// - The first error from closing the files
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    // ========================================================================
    // Internal: Store-wide free list and allocation
    // ========================================================================

    pub(crate) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }

    /// Take one page from the store-wide free list.
    ///
    /// # Errors
    /// `Error::AlreadyLocked` if another live transaction took from or
    /// published to the list and has not ended yet.
    pub(crate) fn pop_free_page(&self, txn: &Transaction) -> Result<Option<PageId>> {
        let mut list = self.inner.free_list.lock();
        if list.is_empty() {
            return Ok(None);
        }
        self.inner.claim_free_list(txn.id())?;
        list.pop(txn)
    }

    /// Hand out a page past the end of the store.
    pub(crate) fn extend(&self) -> Result<PageId> {
        let page_size = self.page_size() as u64;
        let mut state = self.inner.state.lock();
        let page_id = state.page_count;
        let next = page_id.checked_add(1).ok_or(Error::DatabaseTooLarge)?;
        next.checked_mul(page_size).ok_or(Error::DatabaseTooLarge)?;
        state.page_count = next;
        Ok(PageId::new(page_id))
    }

    /// Merge `local` into the store-wide free list and record the new head
    /// in the header, as part of `txn`.
    ///
    /// The merge is staged on a fork of the store list, which replaces it
    /// only once the header was rewritten. On error the store list is left
    /// as it was and `txn`'s pages hold the only trace of the merge.
    pub(crate) fn publish_free_list(&self, txn: &Transaction, local: FreePageList) -> Result<()> {
        let mut list = self.inner.free_list.lock();
        self.inner.claim_free_list(txn.id())?;
        let mut merged = list.fork();
        merged.merge(txn, local)?;
        self.write_header(txn, merged.head())?;
        *list = merged;
        Ok(())
    }

    fn write_header(&self, txn: &Transaction, free_list_head: Option<PageId>) -> Result<()> {
        let mut page = txn.fetch(PageId::HEADER, FetchMode::FetchData)?;
        let mut header = StoreHeader::deserialize(page.data().as_slice())?;
        header.free_list_head = free_list_head;
        txn.will_modify(&page)?;
        header.serialize(page.data_mut().as_mut_slice());
        page.release()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
