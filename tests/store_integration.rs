//! Integration tests for stores and transactions on real files.

use larchdb::{
    Error, FetchMode, MemoryFile, PageId, PagePool, PoolOptions, Store, StoreOptions, TxnStatus,
};
use std::sync::Arc;
use tempfile::tempdir;

fn create_pool(page_shift: u8, capacity: usize) -> Arc<PagePool> {
    Arc::new(PagePool::new(PoolOptions::new(page_shift, capacity)).unwrap())
}

fn write_root(store: &Store, data: &[u8]) {
    let txn = store.begin().unwrap();
    let mut page = txn.fetch(PageId::ROOT, FetchMode::FetchData).unwrap();
    txn.will_modify(&page).unwrap();
    page.data_mut().as_mut_slice()[..data.len()].copy_from_slice(data);
    page.release().unwrap();
    txn.commit().unwrap();
}

/// Test bootstrap, commit and reload across pool instances.
#[test]
fn test_bootstrap_and_reopen_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let data = b"persistent!";

    {
        let pool = create_pool(12, 16);
        let store = Store::open_path(&pool, &path, &StoreOptions::default()).unwrap();
        assert_eq!(store.page_count(), 2);
        write_root(&store, data);
        store.close().unwrap();
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * 4096);
    assert!(path.with_extension("log").exists());

    {
        let pool = create_pool(12, 16);
        let store = Store::open_path(&pool, &path, &StoreOptions::default()).unwrap();
        let txn = store.begin().unwrap();
        let page = txn.fetch(PageId::ROOT, FetchMode::FetchData).unwrap();
        assert_eq!(&page.data().as_slice()[..data.len()], data);
    }
}

/// Test the open options against missing and existing files.
#[test]
fn test_open_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = create_pool(12, 16);

    let strict = StoreOptions {
        create_if_missing: false,
        error_if_exists: false,
    };
    assert!(matches!(
        Store::open_path(&pool, &path, &strict),
        Err(Error::NotFound)
    ));
    assert!(!path.exists());

    Store::open_path(&pool, &path, &StoreOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let exclusive = StoreOptions {
        create_if_missing: true,
        error_if_exists: true,
    };
    assert!(matches!(
        Store::open_path(&pool, &path, &exclusive),
        Err(Error::AlreadyExists)
    ));
    assert!(Store::open_path(&pool, &path, &strict).is_ok());
}

/// Test that a store written with one page size is rejected by a pool
/// with another.
#[test]
fn test_page_size_mismatch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    Store::open_path(&create_pool(6, 8), &path, &StoreOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let result = Store::open_path(&create_pool(7, 8), &path, &StoreOptions::default());
    assert!(matches!(result, Err(Error::DataCorrupted(_))));
}

/// Test that a file whose length is not a whole number of pages is rejected.
#[test]
fn test_truncated_file_is_corrupt() {
    let pool = create_pool(6, 8);
    let seed = MemoryFile::new();
    Store::open(&pool, Box::new(seed.clone()), None, &StoreOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let mut bytes = seed.contents();
    bytes.truncate(100);
    let result = Store::open(
        &pool,
        Box::new(MemoryFile::with_contents(bytes)),
        None,
        &StoreOptions::default(),
    );
    assert!(matches!(result, Err(Error::DataCorrupted(_))));
}

/// Test that freed pages are recorded in the header and reused after reopen.
#[test]
fn test_free_pages_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let freed: Vec<PageId>;

    {
        let pool = create_pool(6, 32);
        let store = Store::open_path(&pool, &path, &StoreOptions::default()).unwrap();

        let txn = store.begin().unwrap();
        let ids: Vec<PageId> = (0..10)
            .map(|_| {
                let page = txn.create_page().unwrap();
                page.page_id().unwrap()
            })
            .collect();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        for &page_id in &ids {
            txn.free_page(page_id).unwrap();
        }
        txn.commit().unwrap();
        freed = ids;
        assert!(store.free_list_head().is_some());
        store.close().unwrap();
    }

    let pool = create_pool(6, 32);
    let store = Store::open_path(&pool, &path, &StoreOptions::default()).unwrap();
    assert_eq!(store.page_count(), 12);
    assert!(store.read_header().unwrap().free_list_head.is_some());

    let txn = store.begin().unwrap();
    let mut reused: Vec<PageId> = (0..10).map(|_| txn.allocate_page().unwrap()).collect();
    reused.sort();
    assert_eq!(reused, freed);

    // Exhausted: the next page extends the file.
    assert_eq!(txn.allocate_page().unwrap(), PageId::new(12));
    txn.commit().unwrap();
    assert_eq!(store.read_header().unwrap().free_list_head, None);
}

/// Test that rolling back an allocation leaves the free page in the list.
#[test]
fn test_rolled_back_allocation_is_not_lost() {
    let pool = create_pool(6, 16);
    let store = Store::open(
        &pool,
        Box::new(MemoryFile::new()),
        None,
        &StoreOptions::default(),
    )
    .unwrap();

    let txn = store.begin().unwrap();
    let ids: Vec<PageId> = (0..3).map(|_| txn.allocate_page().unwrap()).collect();
    for &page_id in &ids {
        txn.free_page(page_id).unwrap();
    }
    txn.commit().unwrap();

    let txn = store.begin().unwrap();
    let first = txn.allocate_page().unwrap();
    txn.rollback().unwrap();

    let txn = store.begin().unwrap();
    assert_eq!(txn.allocate_page().unwrap(), first);
}

/// Test that closing a store rolls back every live transaction.
#[test]
fn test_close_rolls_back_live_transactions() {
    let pool = create_pool(6, 16);
    let file = MemoryFile::new();
    let store = Store::open(&pool, Box::new(file.clone()), None, &StoreOptions::default()).unwrap();
    let before = file.contents();

    let first = store.begin().unwrap();
    let mut page = first.fetch(PageId::ROOT, FetchMode::FetchData).unwrap();
    first.will_modify(&page).unwrap();
    page.data_mut().as_mut_slice()[0] = 1;
    page.release().unwrap();

    let second = store.begin().unwrap();
    second.create_page().unwrap().release().unwrap();
    assert_eq!(second.owned_page_count(), 1);

    store.close().unwrap();
    assert_eq!(first.status(), TxnStatus::RolledBack);
    assert_eq!(second.status(), TxnStatus::RolledBack);
    assert_eq!(pool.cached_count(), 0);
    assert_eq!(pool.pinned_count(), 0);
    assert_eq!(file.contents(), before);
    assert!(file.is_closed());

    assert!(matches!(first.commit(), Err(Error::AlreadyClosed)));
    assert!(matches!(second.rollback(), Err(Error::AlreadyClosed)));
    assert!(matches!(store.begin(), Err(Error::AlreadyClosed)));
}

/// Test transaction status and id ordering across commits.
#[test]
fn test_status_after_commit() {
    let pool = create_pool(6, 16);
    let store = Store::open(
        &pool,
        Box::new(MemoryFile::new()),
        None,
        &StoreOptions::default(),
    )
    .unwrap();

    let txn = store.begin().unwrap();
    assert_eq!(txn.status(), TxnStatus::Open);
    let id = txn.id();
    txn.commit().unwrap();

    let next = store.begin().unwrap();
    assert!(next.id() > id);
    assert!(next.is_open());
    next.rollback().unwrap();
}

/// Test that a commit whose free list merge hits a corrupt list page rolls
/// back cleanly and leaves the store usable.
#[test]
fn test_corrupt_free_list_fails_commit_cleanly() {
    let pool = create_pool(6, 16);
    let seed = MemoryFile::new();
    {
        let store =
            Store::open(&pool, Box::new(seed.clone()), None, &StoreOptions::default()).unwrap();
        let txn = store.begin().unwrap();
        for _ in 0..3 {
            txn.create_page().unwrap().release().unwrap();
        }
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        txn.free_page(PageId::new(2)).unwrap();
        txn.free_page(PageId::new(3)).unwrap();
        txn.commit().unwrap();
        store.close().unwrap();
    }

    // Misaligned next-entry offset on the list head page.
    let file = MemoryFile::with_contents(seed.contents());
    file.patch(2 * 64, &7u64.to_le_bytes());
    let store = Store::open(&pool, Box::new(file.clone()), None, &StoreOptions::default()).unwrap();
    assert_eq!(store.free_list_head(), Some(PageId::new(2)));

    let txn = store.begin().unwrap();
    txn.free_page(PageId::new(4)).unwrap();
    assert!(matches!(txn.commit(), Err(Error::DataCorrupted(_))));

    assert!(!store.is_closed());
    assert_eq!(pool.pinned_count(), 0);
    assert!(!pool.is_resident(&store, PageId::new(4)));
    assert_eq!(store.free_list_head(), Some(PageId::new(2)));
    assert_eq!(
        store.read_header().unwrap().free_list_head,
        Some(PageId::new(2))
    );

    // Work that leaves the free list alone still commits.
    write_root(&store, b"still writable");
    assert_eq!(&file.contents()[64..78], b"still writable");
}
