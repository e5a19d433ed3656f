//! Page Pool - the page cache shared by every store opened against it.
//!
//! The [`PagePool`] provides:
//! - Page caching between store data files and memory, keyed by (store, page)
//! - Pin-based reference counting through [`PageGuard`]
//! - Strict LRU eviction among idle, assigned entries
//! - Write-back of dirty pages when their last pin is released
//! - The bookkeeping behind page ownership by transactions

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, warn};

use crate::buffer::frame::{Frame, ListKind, PageKey};
use crate::buffer::frame_list::FrameList;
use crate::buffer::{PageGuard, PoolStats, StatsSnapshot};
use crate::common::config::PoolOptions;
use crate::common::{Error, FrameId, PageId, Result, StoreId, TxnId};
use crate::storage::Page;
use crate::store::{Store, StoreInner};

/// How [`PagePool::fetch`] fills a newly cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Read the page's bytes from the store.
    FetchData,
    /// Skip the read; the caller overwrites the whole page.
    IgnoreData,
}

/// Bookkeeping guarded by the pool's state lock.
struct PoolState {
    /// Control blocks, created lazily up to capacity.
    frames: Vec<Frame>,

    /// Maps cached pages to the frames holding them.
    page_map: HashMap<PageKey, FrameId>,

    /// Idle unassigned frames.
    free: FrameList,

    /// Idle assigned frames, least recently released first.
    lru: FrameList,

    /// Frames owned by each transaction, keyed by transaction id.
    owned: HashMap<TxnId, FrameList>,

    /// Stores whose pages may be cached, for write-back on release.
    stores: HashMap<StoreId, Weak<StoreInner>>,

    next_store_id: u64,
    next_txn_id: u64,

    /// Number of frames with a non-zero pin count.
    pinned: usize,
}

impl PoolState {
    fn new(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            page_map: HashMap::new(),
            free: FrameList::new(ListKind::Cache),
            lru: FrameList::new(ListKind::Cache),
            owned: HashMap::new(),
            stores: HashMap::new(),
            next_store_id: 1,
            next_txn_id: 1,
            pinned: 0,
        }
    }

    fn next_txn(&mut self) -> TxnId {
        let id = TxnId(self.next_txn_id);
        self.next_txn_id += 1;
        id
    }

    /// Add a pin, taking the frame off the LRU list if it was idle.
    fn pin(&mut self, id: FrameId) {
        let frame = &self.frames[id.0];
        if !frame.is_pinned() {
            // Idle assigned frames sit on the LRU list; unassigned ones were
            // already taken off the free list.
            if frame.is_assigned() && self.lru.is_linked(&self.frames, id) {
                self.lru.remove(&mut self.frames, id);
            }
            self.pinned += 1;
        }
        self.frames[id.0].pin();
    }

    /// Remove a pin. Returns the new pin count.
    fn unpin(&mut self, id: FrameId) -> u32 {
        let remaining = self.frames[id.0].unpin();
        if remaining == 0 {
            self.pinned -= 1;
        }
        remaining
    }

    /// Put an idle frame on the list matching its assignment.
    fn park(&mut self, id: FrameId) {
        debug_assert!(!self.frames[id.0].is_pinned());
        if self.frames[id.0].is_evictable() {
            self.lru.push_back(&mut self.frames, id);
        } else {
            self.free.push_back(&mut self.frames, id);
        }
    }

    fn set_owner(&mut self, id: FrameId, owner: Option<TxnId>) {
        let old = self.frames[id.0].owner();
        if old == owner {
            return;
        }
        if let Some(old) = old {
            if let Some(list) = self.owned.get_mut(&old) {
                list.remove(&mut self.frames, id);
                if list.is_empty() {
                    self.owned.remove(&old);
                }
            }
        }
        if let Some(new) = owner {
            self.owned
                .entry(new)
                .or_insert_with(|| FrameList::new(ListKind::Owner))
                .push_back(&mut self.frames, id);
        }
        self.frames[id.0].set_owner(owner);
    }

    fn bind(&mut self, id: FrameId, key: PageKey, owner: TxnId) {
        debug_assert!(!self.frames[id.0].is_assigned());
        self.frames[id.0].set_key(Some(key));
        self.page_map.insert(key, id);
        self.set_owner(id, Some(owner));
    }

    /// Drop the pin a transaction took in `will_modify`, if any. Returns
    /// true if the frame is now idle and was parked.
    fn drop_owner_pin(&mut self, id: FrameId) -> bool {
        if !self.frames[id.0].has_owner_pin() {
            return false;
        }
        self.frames[id.0].set_owner_pin(false);
        if self.unpin(id) == 0 {
            self.park(id);
            return true;
        }
        false
    }

    /// Drop the frame's assignment and any changes it holds.
    ///
    /// An owner pin is left in place; see [`drop_owner_pin`](Self::drop_owner_pin).
    fn unbind(&mut self, id: FrameId) {
        if let Some(key) = self.frames[id.0].key() {
            self.page_map.remove(&key);
        }
        self.set_owner(id, None);
        let frame = &mut self.frames[id.0];
        frame.set_key(None);
        frame.set_dirty(false);
    }

    /// Clear the dirty flag and hand the frame back to its store's init
    /// transaction.
    fn mark_persisted(&mut self, id: FrameId, init_txn: TxnId) {
        self.frames[id.0].set_dirty(false);
        self.set_owner(id, Some(init_txn));
    }

    fn store_of(&self, id: FrameId) -> Option<Arc<StoreInner>> {
        let key = self.frames[id.0].key()?;
        self.stores.get(&key.store)?.upgrade()
    }
}

/// Fixed-capacity cache of pages from any number of stores.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────────────┐
/// │                          PagePool                             │
/// │  state: Mutex<PoolState>                                      │
/// │  ┌───────────────┐   ┌─────────────────────────────────────┐  │
/// │  │ page_map      │   │  frames: Vec<Frame>  (control)      │  │
/// │  │(store,page)→F │──▶│  [F0] [F1] [F2] ...                 │  │
/// │  └───────────────┘   └─────────────────────────────────────┘  │
/// │  ┌────────┐ ┌────────┐ ┌──────────────────────┐               │
/// │  │ free   │ │  lru   │ │ owned: Txn → list    │  (intrusive)  │
/// │  └────────┘ └────────┘ └──────────────────────┘               │
/// │  buffers: Vec<RwLock<Page>>  (page bytes, one per frame)      │
/// └───────────────────────────────────────────────────────────────┘
/// ```
///
/// # Entry lifecycle
/// An entry is pinned while any [`PageGuard`] refers to it. When the last
/// pin goes away an assigned entry joins the back of the LRU list, after
/// being written back through its store if dirty. A miss takes an entry
/// from the free list, then creates one if the pool is below capacity,
/// then evicts the front of the LRU list. With every entry pinned the miss
/// fails with [`Error::PoolFull`], which callers may recover from by
/// releasing pages.
///
/// # Locking
/// - `state`: one `Mutex` over all bookkeeping. Store I/O for a miss or a
///   write-back happens under it.
/// - `buffers`: an `RwLock` per entry, held only while a caller borrows the
///   bytes through [`PageGuard::data`] or [`PageGuard::data_mut`].
///
/// Do not hold a page's data borrow while calling into the pool or
/// committing: write-back takes the page's read lock.
pub struct PagePool {
    page_shift: u8,
    page_size: usize,
    capacity: usize,

    /// Page bytes, indexed like `PoolState::frames`.
    buffers: Vec<RwLock<Page>>,

    state: Mutex<PoolState>,

    stats: PoolStats,
}

impl PagePool {
    /// Create a pool of `options.capacity` pages of `1 << options.page_shift`
    /// bytes. Page buffers are allocated on first use.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the options fail validation.
    pub fn new(options: PoolOptions) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            page_shift: options.page_shift,
            page_size: options.page_size(),
            capacity: options.capacity,
            buffers: (0..options.capacity)
                .map(|_| RwLock::new(Page::empty()))
                .collect(),
            state: Mutex::new(PoolState::new(options.capacity)),
            stats: PoolStats::new(),
        })
    }

    // ========================================================================
    // Public API: Fetch and release
    // ========================================================================

    /// Pin the entry caching `page_id` of `store`, producing one on a miss.
    ///
    /// A newly produced entry is owned by the store's init transaction.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the store is closed
    /// - `Error::PoolFull` if every entry is pinned
    /// - The store's error if reading the page fails; the entry returns to
    ///   the free list
    pub fn fetch(&self, store: &Store, page_id: PageId, mode: FetchMode) -> Result<PageGuard<'_>> {
        let inner = store.inner();
        if inner.is_closed() {
            return Err(Error::AlreadyClosed);
        }
        let key = PageKey::new(inner.id(), page_id);

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&id) = state.page_map.get(&key) {
            state.pin(id);
            PoolStats::record(&self.stats.cache_hits);
            return Ok(PageGuard::new(self, id));
        }

        PoolStats::record(&self.stats.cache_misses);
        let id = self.take_frame(state)?;

        if mode == FetchMode::FetchData {
            if let Err(err) = self.read_into(inner, page_id, id) {
                state.unpin(id);
                state.park(id);
                return Err(err);
            }
        }

        state.bind(id, key, inner.init_txn());
        Ok(PageGuard::new(self, id))
    }

    /// Pin an entry that caches nothing.
    ///
    /// # Errors
    /// `Error::PoolFull` if every entry is pinned.
    pub fn allocate_unassigned(&self) -> Result<PageGuard<'_>> {
        let mut guard = self.state.lock();
        let id = self.take_frame(&mut guard)?;
        Ok(PageGuard::new(self, id))
    }

    /// Bind the unassigned entry behind `page` to `page_id` of `store`.
    ///
    /// # Errors
    /// - `Error::AlreadyClosed` if the store is closed
    /// - `Error::AlreadyExists` if the page is already cached
    /// - The store's error if reading the page fails; the entry stays
    ///   pinned and unassigned
    ///
    /// # Panics
    /// Panics if the entry is already assigned.
    pub fn assign(
        &self,
        page: &mut PageGuard<'_>,
        store: &Store,
        page_id: PageId,
        mode: FetchMode,
    ) -> Result<()> {
        let inner = store.inner();
        if inner.is_closed() {
            return Err(Error::AlreadyClosed);
        }
        let key = PageKey::new(inner.id(), page_id);
        let id = page.frame_id();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        assert!(
            !state.frames[id.0].is_assigned(),
            "assign on an entry that is already assigned"
        );
        if state.page_map.contains_key(&key) {
            return Err(Error::AlreadyExists);
        }

        if mode == FetchMode::FetchData {
            self.read_into(inner, page_id, id)?;
        }

        state.bind(id, key, inner.init_txn());
        Ok(())
    }

    /// Unbind the entry behind `page`, writing it back first if dirty.
    ///
    /// Unassigning an unassigned entry does nothing.
    ///
    /// # Errors
    /// The store's error if the write-back fails. The entry is unassigned
    /// anyway and its store is closed.
    pub fn unassign(&self, page: &mut PageGuard<'_>) -> Result<()> {
        let id = page.frame_id();
        // Declared before the state lock so a last store reference is
        // dropped after the lock is released.
        let store: Option<Arc<StoreInner>>;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.frames[id.0].is_assigned() {
            return Ok(());
        }

        store = state.store_of(id);
        let mut result = Ok(());
        if state.frames[id.0].is_dirty() {
            if let Some(live) = store.as_ref().filter(|s| !s.is_closed()) {
                result = self.write_back(state, live, id);
            }
        }
        state.unbind(id);
        state.drop_owner_pin(id);
        drop(guard);

        if let (Err(err), Some(store)) = (&result, &store) {
            self.escalate_write_failure(store, err);
        }
        result
    }

    /// Remove one pin from `id`. Called by [`PageGuard`].
    pub(crate) fn release_frame(&self, id: FrameId) -> Result<()> {
        let mut guard = self.state.lock();
        if guard.unpin(id) > 0 {
            return Ok(());
        }
        self.settle(guard, id)
    }

    /// Park an entry whose pin count just reached zero, writing it back
    /// first if dirty. A failed write-back discards the entry and closes
    /// its store.
    fn settle(&self, mut guard: MutexGuard<'_, PoolState>, id: FrameId) -> Result<()> {
        let state = &mut *guard;
        if !state.frames[id.0].is_assigned() {
            state.park(id);
            return Ok(());
        }

        let store = state.store_of(id);
        let result = match store.as_ref().filter(|s| !s.is_closed()) {
            None => {
                state.unbind(id);
                Ok(())
            }
            Some(live) if state.frames[id.0].is_dirty() => {
                let result = self.write_back(state, live, id);
                if result.is_err() {
                    state.unbind(id);
                }
                result
            }
            Some(_) => Ok(()),
        };
        state.park(id);
        drop(guard);

        if let (Err(err), Some(store)) = (&result, &store) {
            self.escalate_write_failure(store, err);
        }
        result
    }

    // ========================================================================
    // Public API: Introspection
    // ========================================================================

    /// Page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Page size exponent.
    #[inline]
    pub fn page_shift(&self) -> u8 {
        self.page_shift
    }

    /// Maximum number of cached pages.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries created so far. Never exceeds [`capacity`](Self::capacity).
    pub fn resident_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Number of entries with at least one pin.
    pub fn pinned_count(&self) -> usize {
        self.state.lock().pinned
    }

    /// Number of idle assigned entries.
    pub fn lru_len(&self) -> usize {
        self.state.lock().lru.len()
    }

    /// Number of idle unassigned entries.
    pub fn free_len(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Number of cached pages.
    pub fn cached_count(&self) -> usize {
        self.state.lock().page_map.len()
    }

    /// True if `page_id` of `store` is cached.
    pub fn is_resident(&self, store: &Store, page_id: PageId) -> bool {
        let key = PageKey::new(store.id(), page_id);
        self.state.lock().page_map.contains_key(&key)
    }

    /// Pin count of the entry caching `page_id` of `store`, 0 if not cached.
    pub fn pin_count(&self, store: &Store, page_id: PageId) -> u32 {
        let key = PageKey::new(store.id(), page_id);
        let state = self.state.lock();
        state
            .page_map
            .get(&key)
            .map_or(0, |id| state.frames[id.0].pin_count())
    }

    /// Transaction owning the cached copy of `page_id` of `store`.
    pub fn page_owner(&self, store: &Store, page_id: PageId) -> Option<TxnId> {
        let key = PageKey::new(store.id(), page_id);
        let state = self.state.lock();
        state
            .page_map
            .get(&key)
            .and_then(|id| state.frames[id.0].owner())
    }

    /// Get page pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Shorthand for `stats().snapshot()`.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ========================================================================
    // Internal: Page guard support
    // ========================================================================

    pub(crate) fn buffer(&self, id: FrameId) -> &RwLock<Page> {
        &self.buffers[id.0]
    }

    pub(crate) fn frame_key(&self, id: FrameId) -> Option<PageKey> {
        self.state.lock().frames[id.0].key()
    }

    pub(crate) fn frame_is_dirty(&self, id: FrameId) -> bool {
        self.state.lock().frames[id.0].is_dirty()
    }

    /// True if the caller may change the bytes of `id`: the entry is
    /// unassigned, or a transaction declared the change.
    pub(crate) fn frame_is_writable(&self, id: FrameId) -> bool {
        let state = self.state.lock();
        let frame = &state.frames[id.0];
        !frame.is_assigned() || frame.is_dirty()
    }

    // ========================================================================
    // Internal: Ownership protocol (called by transactions)
    // ========================================================================

    /// Hand out a fresh transaction id.
    pub(crate) fn next_txn_id(&self) -> TxnId {
        self.state.lock().next_txn()
    }

    /// Reserve ids for a store about to be registered.
    pub(crate) fn allocate_store_ids(&self) -> (StoreId, TxnId) {
        let mut state = self.state.lock();
        let store_id = StoreId(state.next_store_id);
        state.next_store_id += 1;
        (store_id, state.next_txn())
    }

    pub(crate) fn register_store(&self, id: StoreId, store: Weak<StoreInner>) {
        self.state.lock().stores.insert(id, store);
    }

    pub(crate) fn unregister_store(&self, id: StoreId) {
        self.state.lock().stores.remove(&id);
    }

    /// Move the entry `id` to `txn` and mark it dirty.
    ///
    /// The first call for an entry takes an extra pin on behalf of the
    /// transaction, so modified pages stay cached until it ends.
    ///
    /// # Panics
    /// Panics if the entry is not pinned or not assigned.
    pub(crate) fn will_modify(&self, id: FrameId, txn: TxnId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let frame = &state.frames[id.0];
        assert!(frame.is_pinned(), "will_modify on an unpinned entry");
        assert!(frame.is_assigned(), "will_modify on an unassigned entry");
        debug_assert!(
            !frame.is_dirty() || frame.owner() == Some(txn),
            "page is already dirty under another transaction"
        );

        if frame.owner() != Some(txn) {
            state.set_owner(id, Some(txn));
        }
        if !state.frames[id.0].has_owner_pin() {
            state.pin(id);
            state.frames[id.0].set_owner_pin(true);
        }
        state.frames[id.0].set_dirty(true);
    }

    /// Entries currently owned by `txn`, oldest first.
    pub(crate) fn owned_frames(&self, txn: TxnId) -> Vec<FrameId> {
        let state = self.state.lock();
        state
            .owned
            .get(&txn)
            .map_or_else(Vec::new, |list| list.ids(&state.frames))
    }

    /// Number of entries owned by `txn`.
    pub(crate) fn owned_count(&self, txn: TxnId) -> usize {
        self.state
            .lock()
            .owned
            .get(&txn)
            .map_or(0, FrameList::len)
    }

    /// Make the entry `id` durable, hand it back to its store's init
    /// transaction and drop `txn`'s pin on it.
    ///
    /// Does nothing unless `txn` owns the entry. A failed write-back
    /// discards the entry and closes the store.
    pub(crate) fn persist_frame(&self, id: FrameId, txn: TxnId, store: &StoreInner) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.frames[id.0].owner() != Some(txn) {
            return Ok(());
        }

        // Last pin: the regular release path writes the page back.
        state.frames[id.0].set_owner_pin(false);
        if state.unpin(id) == 0 {
            return self.settle(guard, id);
        }

        // Still pinned by a guard: write it back now.
        if !state.frames[id.0].is_dirty() {
            state.mark_persisted(id, store.init_txn());
            return Ok(());
        }
        let result = self.write_back(state, store, id);
        if result.is_err() {
            state.unbind(id);
        }
        drop(guard);

        if let Err(err) = &result {
            self.escalate_write_failure(store, err);
        }
        result
    }

    /// Throw away the cached copy in `id`, along with any owner pin.
    ///
    /// An idle entry moves to the free list. An entry still pinned by a
    /// guard is detached and moves there when its last pin is released.
    pub(crate) fn discard_frame(&self, id: FrameId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.frames[id.0].is_assigned() {
            return;
        }

        if state.frames[id.0].is_pinned() {
            state.unbind(id);
            state.drop_owner_pin(id);
        } else {
            state.lru.remove(&mut state.frames, id);
            state.unbind(id);
            state.park(id);
        }
    }

    // ========================================================================
    // Internal: Frame allocation and I/O
    // ========================================================================

    /// Produce a pinned, unassigned entry.
    fn take_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(id) = state.free.pop_front(&mut state.frames) {
            state.pin(id);
            return Ok(id);
        }

        if state.frames.len() < self.capacity {
            let id = FrameId::new(state.frames.len());
            state.frames.push(Frame::new());
            self.buffers[id.0].write().resize(self.page_size);
            state.pin(id);
            return Ok(id);
        }

        let Some(id) = state.lru.pop_front(&mut state.frames) else {
            warn!(capacity = self.capacity, "pool.full");
            return Err(Error::PoolFull);
        };
        debug_assert!(!state.frames[id.0].is_dirty(), "dirty entry on the LRU list");
        if let Some(key) = state.frames[id.0].key() {
            debug!(frame = %id, page = %key, "pool.evict");
        }
        state.unbind(id);
        PoolStats::record(&self.stats.evictions);
        state.pin(id);
        Ok(id)
    }

    fn read_into(&self, store: &StoreInner, page_id: PageId, id: FrameId) -> Result<()> {
        let mut page = self.buffers[id.0].write();
        store.read_page(page_id, &mut page)?;
        PoolStats::record(&self.stats.pages_read);
        Ok(())
    }

    /// Write a dirty entry through its store, then mark it persisted.
    fn write_back(&self, state: &mut PoolState, store: &StoreInner, id: FrameId) -> Result<()> {
        let Some(key) = state.frames[id.0].key() else {
            return Ok(());
        };
        {
            let page = self.buffers[id.0].read();
            store.write_page(key.page, &page)?;
        }
        PoolStats::record(&self.stats.pages_written);
        state.mark_persisted(id, store.init_txn());
        Ok(())
    }

    /// A lost write-back must not go unnoticed: close the owning store so
    /// every later operation on it fails.
    ///
    /// Must be called without the state lock held.
    fn escalate_write_failure(&self, store: &StoreInner, err: &Error) {
        PoolStats::record(&self.stats.write_back_failures);
        error!(store = %store.id(), error = %err, "pool.write_back_failed");
        store.close_after_write_failure();
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("page_size", &self.page_size)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFile;
    use crate::StoreOptions;

    /// Pool of 64-byte pages plus a bootstrapped in-memory store.
    fn create_pool(capacity: usize) -> (Arc<PagePool>, Store, MemoryFile) {
        let pool = Arc::new(PagePool::new(PoolOptions::new(6, capacity)).unwrap());
        let file = MemoryFile::new();
        let store = Store::open(
            &pool,
            Box::new(file.clone()),
            None,
            &StoreOptions::default(),
        )
        .unwrap();
        (pool, store, file)
    }

    /// Grow the store's data file to hold `pages` pages.
    fn extend(file: &MemoryFile, pages: u64) {
        let len = (pages * 64) as usize;
        if file.contents().len() < len {
            file.patch(len - 1, &[0]);
        }
    }

    #[test]
    fn test_new_validates_options() {
        assert!(matches!(
            PagePool::new(PoolOptions::new(6, 0)),
            Err(Error::InvalidConfig(_))
        ));
        let pool = PagePool::new(PoolOptions::new(6, 4)).unwrap();
        assert_eq!(pool.page_size(), 64);
        assert_eq!(pool.resident_count(), 0);
    }

    #[test]
    fn test_fetch_reads_page_bytes() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);
        file.patch(2 * 64, &[0xAB; 8]);

        let page = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        assert_eq!(page.page_id(), Some(PageId::new(2)));
        assert_eq!(page.data().as_slice()[..8], [0xAB; 8]);
    }

    #[test]
    fn test_cache_hit_pins_same_entry() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);
        pool.stats().reset();

        let a = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        let b = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();

        assert_eq!(a.frame_id(), b.frame_id());
        assert_eq!(pool.pin_count(&store, PageId::new(2)), 2);
        assert_eq!(pool.pinned_count(), 1);

        let snapshot = pool.stats_snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);

        drop(a);
        assert_eq!(pool.pin_count(&store, PageId::new(2)), 1);
        drop(b);
        assert_eq!(pool.pin_count(&store, PageId::new(2)), 0);
        assert_eq!(pool.pinned_count(), 0);
    }

    #[test]
    fn test_read_failure_returns_entry_to_free_list() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);
        let free_before = pool.free_len();

        file.set_fail_reads(true);
        let err = pool
            .fetch(&store, PageId::new(2), FetchMode::FetchData)
            .unwrap_err();
        assert!(err.is_io());

        assert!(!pool.is_resident(&store, PageId::new(2)));
        assert_eq!(pool.pinned_count(), 0);
        assert_eq!(pool.free_len(), free_before + 1);
    }

    #[test]
    fn test_ignore_data_skips_read() {
        let (pool, store, file) = create_pool(4);
        pool.stats().reset();

        // Page 10 is past the end of the file, so a read would fail.
        file.set_fail_reads(true);
        let page = pool
            .fetch(&store, PageId::new(10), FetchMode::IgnoreData)
            .unwrap();
        assert_eq!(page.page_id(), Some(PageId::new(10)));
        assert_eq!(pool.stats_snapshot().pages_read, 0);
    }

    #[test]
    fn test_pool_full_when_all_pinned() {
        let (pool, store, file) = create_pool(2);
        extend(&file, 5);

        let _a = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        let _b = pool.fetch(&store, PageId::new(3), FetchMode::FetchData).unwrap();

        assert!(matches!(
            pool.fetch(&store, PageId::new(4), FetchMode::FetchData),
            Err(Error::PoolFull)
        ));
        assert!(matches!(pool.allocate_unassigned(), Err(Error::PoolFull)));
        assert_eq!(pool.resident_count(), 2);
    }

    #[test]
    fn test_lru_eviction_order() {
        let (pool, store, file) = create_pool(3);
        extend(&file, 6);

        for id in [2, 3, 4] {
            pool.fetch(&store, PageId::new(id), FetchMode::FetchData)
                .unwrap()
                .release()
                .unwrap();
        }

        // Re-pinning page 2 moves it to the back of the LRU list.
        pool.fetch(&store, PageId::new(2), FetchMode::FetchData)
            .unwrap()
            .release()
            .unwrap();
        assert_eq!(pool.lru_len(), 3);

        pool.stats().reset();
        pool.fetch(&store, PageId::new(5), FetchMode::FetchData)
            .unwrap()
            .release()
            .unwrap();
        assert!(!pool.is_resident(&store, PageId::new(3)));
        assert!(pool.is_resident(&store, PageId::new(2)));
        assert!(pool.is_resident(&store, PageId::new(4)));
        assert_eq!(pool.stats_snapshot().evictions, 1);
    }

    #[test]
    fn test_pinned_entries_are_never_evicted() {
        let (pool, store, file) = create_pool(2);
        extend(&file, 5);

        let held = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        for id in [3, 4] {
            pool.fetch(&store, PageId::new(id), FetchMode::FetchData)
                .unwrap()
                .release()
                .unwrap();
        }

        assert!(pool.is_resident(&store, PageId::new(2)));
        assert_eq!(held.page_id(), Some(PageId::new(2)));
    }

    #[test]
    fn test_allocate_assign_unassign() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);
        file.patch(2 * 64, &[7; 4]);

        let mut page = pool.allocate_unassigned().unwrap();
        assert_eq!(page.page_id(), None);

        pool.assign(&mut page, &store, PageId::new(2), FetchMode::FetchData)
            .unwrap();
        assert_eq!(page.page_id(), Some(PageId::new(2)));
        assert_eq!(page.data().as_slice()[..4], [7; 4]);
        assert_eq!(pool.page_owner(&store, PageId::new(2)), Some(store.init_txn()));

        pool.unassign(&mut page).unwrap();
        assert_eq!(page.page_id(), None);
        assert!(!pool.is_resident(&store, PageId::new(2)));

        let free_before = pool.free_len();
        drop(page);
        assert_eq!(pool.free_len(), free_before + 1);
    }

    #[test]
    fn test_assign_cached_key_fails() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);

        let _cached = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        let mut page = pool.allocate_unassigned().unwrap();
        assert!(matches!(
            pool.assign(&mut page, &store, PageId::new(2), FetchMode::IgnoreData),
            Err(Error::AlreadyExists)
        ));
        assert_eq!(page.page_id(), None);
    }

    #[test]
    fn test_unassign_writes_back_dirty_page() {
        let (pool, store, file) = create_pool(4);
        extend(&file, 3);
        let txn = store.begin().unwrap();

        let mut page = pool.fetch(&store, PageId::new(2), FetchMode::FetchData).unwrap();
        txn.will_modify(&page).unwrap();
        page.data_mut().as_mut_slice()[0] = 0x5A;

        pool.unassign(&mut page).unwrap();
        assert_eq!(file.contents()[2 * 64], 0x5A);
        assert_eq!(txn.owned_page_count(), 0);
    }

    #[test]
    fn test_closed_store_rejects_fetch() {
        let (pool, store, _file) = create_pool(4);
        store.close().unwrap();
        assert!(matches!(
            pool.fetch(&store, PageId::ROOT, FetchMode::FetchData),
            Err(Error::AlreadyClosed)
        ));
    }
}
