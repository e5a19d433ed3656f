//! Free page list - reclaimed page ids stored inside the pages they track.
//!
//! The list is a chain of list pages (layout in
//! [`free_list_format`](super::free_list_format)). Only the head page may be
//! partially full; every page after it is full. An exhausted head page is
//! itself a free page, so the list never holds space it cannot give back.
//!
//! ```text
//!  head                      rest (full pages)              tail
//! ┌──────────┐   ┌──────────┐   ┌──────────┐         ┌──────────┐
//! │ 3 of 6   │──▶│ 6 of 6   │──▶│ 6 of 6   │── ... ─▶│ 6 of 6   │──▶ 0
//! └──────────┘   └──────────┘   └──────────┘         └──────────┘
//! ```
//!
//! All list pages are read and written through the page pool on behalf of
//! a [`Transaction`], so list changes commit or roll back with it.

use crate::buffer::FetchMode;
use crate::common::{Error, PageId, Result};
use crate::storage::free_list_format::{self as format, ENTRY_SIZE, FIRST_ENTRY_OFFSET};
use crate::txn::Transaction;

/// Handle to a free page list: its head page and, when known, its tail.
///
/// Not `Clone`: [`merge`](Self::merge) consumes the absorbed list, so a list
/// cannot be used after its pages were spliced into another.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FreePageList {
    head: Option<PageId>,
    tail: Option<PageId>,
}

impl FreePageList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// A list starting at `head`, as recorded in a store header. The tail
    /// is found by walking the chain if a merge needs it.
    pub fn with_head(head: Option<PageId>) -> Self {
        Self { head, tail: None }
    }

    /// First list page, or `None` if the list is empty.
    #[inline]
    pub fn head(&self) -> Option<PageId> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// A second handle on the same chain, for staging changes that may
    /// have to be thrown away. Only one of the two may be used afterwards.
    pub(crate) fn fork(&self) -> Self {
        Self {
            head: self.head,
            tail: self.tail,
        }
    }

    /// Take one free page id, or `None` if the list is empty.
    ///
    /// Ids come off the head page last-in first-out. Once the head page has
    /// no entries left, its own id is returned and the list advances to the
    /// next list page.
    ///
    /// # Errors
    /// - `Error::DataCorrupted` if the head page's offset is out of range or
    ///   misaligned, or the popped entry is 0
    /// - Any error fetching the head page
    pub fn pop(&mut self, txn: &Transaction) -> Result<Option<PageId>> {
        let Some(head) = self.head else {
            return Ok(None);
        };

        let mut page = txn.fetch(head, FetchMode::FetchData)?;
        let offset = format::next_entry_offset(&page.data())?;

        if offset == FIRST_ENTRY_OFFSET {
            let next = format::next_page_id(&page.data());
            page.release()?;
            self.head = next;
            if next.is_none() {
                self.tail = None;
            }
            return Ok(Some(head));
        }

        let last = offset - ENTRY_SIZE;
        let page_id = format::entry(&page.data(), last)?;
        txn.will_modify(&page)?;
        format::set_next_entry_offset(&mut page.data_mut(), last);
        page.release()?;
        Ok(Some(page_id))
    }

    /// Give `page_id` back to the list.
    ///
    /// If the head page has room the id is appended to it. Otherwise the
    /// freed page becomes the new, empty head page.
    ///
    /// # Errors
    /// - `Error::DataCorrupted` if the head page's offset is out of range or
    ///   misaligned
    /// - Any error fetching the pages involved
    ///
    /// # Panics
    /// Panics if `page_id` is the header page.
    pub fn push(&mut self, txn: &Transaction, page_id: PageId) -> Result<()> {
        assert_ne!(page_id, PageId::HEADER, "the header page is never free");

        if let Some(head) = self.head {
            let mut page = txn.fetch(head, FetchMode::FetchData)?;
            let offset = format::next_entry_offset(&page.data())?;
            if offset < page.data().size() {
                txn.will_modify(&page)?;
                {
                    let mut data = page.data_mut();
                    format::set_entry(&mut data, offset, page_id);
                    format::set_next_entry_offset(&mut data, offset + ENTRY_SIZE);
                }
                return page.release();
            }
            page.release()?;
        }

        let mut page = txn.fetch(page_id, FetchMode::IgnoreData)?;
        txn.will_modify(&page)?;
        format::init_page(&mut page.data_mut(), self.head);
        page.release()?;

        if self.head.is_none() {
            self.tail = Some(page_id);
        }
        self.head = Some(page_id);
        Ok(())
    }

    /// Absorb every page of `other` into this list.
    ///
    /// The full pages of `other` are spliced in front of this list's full
    /// pages, then the two head pages are combined: entries move from the
    /// fuller head into the one with more room. If they all fit, the
    /// emptied head page is recorded as a free entry (or kept as an empty
    /// head when no slot is left). If they do not, the fuller head stays the
    /// list head, followed by the now-full survivor.
    ///
    /// Touches both head pages and at most one tail page, plus a walk of
    /// `other`'s chain when its tail is unknown.
    ///
    /// # Errors
    /// - `Error::DataCorrupted` if either head page is malformed, `other`
    ///   shares this list's head, or `other`'s chain is cyclic
    /// - Any error fetching the pages involved
    pub fn merge(&mut self, txn: &Transaction, other: FreePageList) -> Result<()> {
        let Some(b) = other.head else {
            return Ok(());
        };
        let Some(a) = self.head else {
            *self = other;
            return Ok(());
        };
        if a == b {
            return Err(Error::DataCorrupted("free page list merged with itself"));
        }

        let a_page = txn.fetch(a, FetchMode::FetchData)?;
        let b_page = txn.fetch(b, FetchMode::FetchData)?;
        let a_offset = format::next_entry_offset(&a_page.data())?;
        let b_offset = format::next_entry_offset(&b_page.data())?;
        let a_rest = format::next_page_id(&a_page.data());
        let b_rest = format::next_page_id(&b_page.data());
        let page_size = a_page.data().size();

        // Splice: B's full pages go in front of A's.
        if let (Some(b_first), Some(a_first)) = (b_rest, a_rest) {
            let b_tail = match other.tail {
                Some(tail) if tail != b => tail,
                _ => find_tail(txn, b_first)?,
            };
            let mut tail_page = txn.fetch(b_tail, FetchMode::FetchData)?;
            txn.will_modify(&tail_page)?;
            format::set_next_page_id(&mut tail_page.data_mut(), Some(a_first));
            tail_page.release()?;
        }
        let rest = b_rest.or(a_rest);
        let tail = if a_rest.is_some() {
            self.tail
        } else if b_rest.is_some() {
            other.tail.filter(|&tail| tail != b)
        } else {
            None
        };

        // Survivor: the head page with more free room.
        let a_room = (page_size - a_offset) / ENTRY_SIZE;
        let b_room = (page_size - b_offset) / ENTRY_SIZE;
        let (mut h_page, h_id, h_offset, mut o_page, o_id, o_offset) = if a_room >= b_room {
            (a_page, a, a_offset, b_page, b, b_offset)
        } else {
            (b_page, b, b_offset, a_page, a, a_offset)
        };

        let h_room = (page_size - h_offset) / ENTRY_SIZE;
        let o_count = format::entry_count(o_offset);
        let moved = o_count.min(h_room);

        // Validate every entry before changing anything.
        let moving = {
            let o_data = o_page.data();
            ((o_count - moved)..o_count)
                .map(|i| format::entry(&o_data, FIRST_ENTRY_OFFSET + i * ENTRY_SIZE))
                .collect::<Result<Vec<_>>>()?
        };

        txn.will_modify(&h_page)?;
        let mut h_next = h_offset;
        {
            let mut h_data = h_page.data_mut();
            for page_id in moving {
                format::set_entry(&mut h_data, h_next, page_id);
                h_next += ENTRY_SIZE;
            }
        }

        let o_remaining = o_count - moved;
        if o_remaining == 0 && h_next < page_size {
            {
                let mut h_data = h_page.data_mut();
                format::set_entry(&mut h_data, h_next, o_id);
                format::set_next_entry_offset(&mut h_data, h_next + ENTRY_SIZE);
                format::set_next_page_id(&mut h_data, rest);
            }
            o_page.release()?;
            h_page.release()?;
            self.head = Some(h_id);
        } else {
            {
                let mut h_data = h_page.data_mut();
                format::set_next_entry_offset(&mut h_data, h_next);
                format::set_next_page_id(&mut h_data, rest);
            }
            txn.will_modify(&o_page)?;
            {
                let mut o_data = o_page.data_mut();
                format::set_next_entry_offset(
                    &mut o_data,
                    FIRST_ENTRY_OFFSET + o_remaining * ENTRY_SIZE,
                );
                format::set_next_page_id(&mut o_data, Some(h_id));
            }
            o_page.release()?;
            h_page.release()?;
            self.head = Some(o_id);
        }

        self.tail = if rest.is_some() { tail } else { Some(h_id) };
        Ok(())
    }
}

/// Follow next-page links from `start` to the last list page.
///
/// The walk is bounded by the store's page count, so a cyclic chain is
/// reported instead of looping forever.
fn find_tail(txn: &Transaction, start: PageId) -> Result<PageId> {
    let limit = txn.store().page_count();
    let mut current = start;
    for _ in 0..limit {
        let page = txn.fetch(current, FetchMode::FetchData)?;
        let next = format::next_page_id(&page.data());
        page.release()?;
        match next {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
    Err(Error::DataCorrupted("free page list chain is cyclic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PagePool;
    use crate::common::config::{PoolOptions, StoreOptions};
    use crate::storage::MemoryFile;
    use crate::Store;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const PAGE: u64 = 64;

    /// Bootstrapped in-memory store with 64-byte pages, grown to `pages`
    /// pages, with `patches` of (page, offset, value) applied before open.
    fn open_store(pages: u64, patches: &[(u64, usize, u64)]) -> (Arc<PagePool>, Store) {
        let pool = Arc::new(PagePool::new(PoolOptions::new(6, 16)).unwrap());
        let seed = MemoryFile::new();
        Store::open(&pool, Box::new(seed.clone()), None, &StoreOptions::default())
            .unwrap()
            .close()
            .unwrap();

        let file = MemoryFile::with_contents(seed.contents());
        file.patch((pages * PAGE - 1) as usize, &[0]);
        for &(page, offset, value) in patches {
            file.patch((page * PAGE) as usize + offset, &value.to_le_bytes());
        }
        let store = Store::open(&pool, Box::new(file), None, &StoreOptions::default()).unwrap();
        (pool, store)
    }

    fn fresh_store() -> (Arc<PagePool>, Store) {
        open_store(2, &[])
    }

    fn drain(list: &mut FreePageList, txn: &Transaction) -> Vec<PageId> {
        let mut popped = Vec::new();
        while let Some(page_id) = list.pop(txn).unwrap() {
            popped.push(page_id);
        }
        popped
    }

    fn build(txn: &Transaction, count: usize) -> (FreePageList, Vec<PageId>) {
        let mut list = FreePageList::new();
        let mut ids = Vec::new();
        for _ in 0..count {
            let page_id = txn.allocate_page().unwrap();
            list.push(txn, page_id).unwrap();
            ids.push(page_id);
        }
        (list, ids)
    }

    #[test]
    fn test_pop_empty_is_none() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let mut list = FreePageList::new();
        assert_eq!(list.pop(&txn).unwrap(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_first_push_becomes_head() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let mut list = FreePageList::new();

        list.push(&txn, PageId::new(5)).unwrap();
        assert_eq!(list.head(), Some(PageId::new(5)));
        assert_eq!(list.pop(&txn).unwrap(), Some(PageId::new(5)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_lifo_within_head_page() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let mut list = FreePageList::new();

        for id in [10, 11, 12, 13] {
            list.push(&txn, PageId::new(id)).unwrap();
        }

        // Page 10 hosts the list and comes back last.
        let popped: Vec<u64> = drain(&mut list, &txn).iter().map(|p| p.0).collect();
        assert_eq!(popped, vec![13, 12, 11, 10]);
    }

    #[test]
    fn test_full_head_starts_new_page() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let mut list = FreePageList::new();

        // Page 20 hosts 6 entries (64-byte pages); page 27 starts a new head.
        for id in 20..=27 {
            list.push(&txn, PageId::new(id)).unwrap();
        }
        assert_eq!(list.head(), Some(PageId::new(27)));

        let popped: Vec<u64> = drain(&mut list, &txn).iter().map(|p| p.0).collect();
        assert_eq!(popped, vec![27, 26, 25, 24, 23, 22, 21, 20]);
    }

    #[test]
    fn test_merge_into_empty_takes_other() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let (other, ids) = build(&txn, 3);

        let mut list = FreePageList::new();
        list.merge(&txn, other).unwrap();

        let popped: BTreeSet<_> = drain(&mut list, &txn).into_iter().collect();
        assert_eq!(popped, ids.into_iter().collect());
    }

    #[test]
    fn test_merge_with_itself_is_corrupt() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        let (mut list, _) = build(&txn, 2);
        let alias = FreePageList::with_head(list.head());

        assert!(matches!(
            list.merge(&txn, alias),
            Err(Error::DataCorrupted(_))
        ));
    }

    #[test]
    fn test_merge_moves_entries_into_roomier_head() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        // 2 entries vs 3 entries: everything fits on the first list's head
        // page, and the emptied second head page becomes an entry too.
        let (mut a, a_ids) = build(&txn, 3);
        let (b, b_ids) = build(&txn, 4);
        let a_head = a.head();

        a.merge(&txn, b).unwrap();
        assert_eq!(a.head(), a_head);

        let popped = drain(&mut a, &txn);
        assert_eq!(popped.len(), 7);
        let expected: BTreeSet<_> = a_ids.into_iter().chain(b_ids).collect();
        assert_eq!(popped.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn test_merge_overflow_keeps_fuller_head_in_front() {
        let (_pool, store) = fresh_store();
        let txn = store.begin().unwrap();
        // 4 entries vs 5 entries on 6-slot pages: they cannot share a page.
        let (mut a, a_ids) = build(&txn, 5);
        let (b, b_ids) = build(&txn, 6);
        let b_head = b.head();

        a.merge(&txn, b).unwrap();
        assert_eq!(a.head(), b_head);

        let popped = drain(&mut a, &txn);
        let expected: BTreeSet<_> = a_ids.into_iter().chain(b_ids).collect();
        assert_eq!(popped.len(), expected.len());
        assert_eq!(popped.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn test_corrupt_offset_is_rejected() {
        for bad in [0u64, 8, 20, 72, u64::MAX] {
            let (_pool, store) = open_store(4, &[(2, 0, bad)]);
            let txn = store.begin().unwrap();

            let mut list = FreePageList::with_head(Some(PageId::new(2)));
            assert!(matches!(list.pop(&txn), Err(Error::DataCorrupted(_))));
            assert!(matches!(
                list.push(&txn, PageId::new(3)),
                Err(Error::DataCorrupted(_))
            ));

            let mut healthy = FreePageList::new();
            healthy.push(&txn, PageId::new(3)).unwrap();
            let corrupt = FreePageList::with_head(Some(PageId::new(2)));
            assert!(matches!(
                healthy.merge(&txn, corrupt),
                Err(Error::DataCorrupted(_))
            ));
        }
    }

    #[test]
    fn test_zero_entry_is_rejected() {
        // Offset 24 claims one entry, but the entry slot is zero.
        let (_pool, store) = open_store(3, &[(2, 0, 24)]);
        let txn = store.begin().unwrap();

        let mut list = FreePageList::with_head(Some(PageId::new(2)));
        assert!(matches!(list.pop(&txn), Err(Error::DataCorrupted(_))));
    }

    #[test]
    fn test_cyclic_chain_is_rejected() {
        // B: head 2 -> 3 -> 4 -> 3 ... ; A: head 5 -> 6.
        let full = 64;
        let (_pool, store) = open_store(
            8,
            &[
                (2, 0, 16),
                (2, 8, 3),
                (3, 0, full),
                (3, 8, 4),
                (4, 0, full),
                (4, 8, 3),
                (5, 0, 16),
                (5, 8, 6),
                (6, 0, full),
            ],
        );
        let txn = store.begin().unwrap();

        let mut a = FreePageList::with_head(Some(PageId::new(5)));
        let b = FreePageList::with_head(Some(PageId::new(2)));
        assert!(matches!(a.merge(&txn, b), Err(Error::DataCorrupted(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_push_pop_roundtrip(count in 0usize..40) {
            let (_pool, store) = fresh_store();
            let txn = store.begin().unwrap();
            let (mut list, ids) = build(&txn, count);

            let popped = drain(&mut list, &txn);
            prop_assert_eq!(popped.len(), count);
            prop_assert_eq!(
                popped.into_iter().collect::<BTreeSet<_>>(),
                ids.into_iter().collect::<BTreeSet<_>>()
            );
            prop_assert_eq!(list.pop(&txn).unwrap(), None);
        }

        #[test]
        fn prop_merge_yields_union(n1 in 0usize..30, n2 in 0usize..30) {
            let (_pool, store) = fresh_store();
            let txn = store.begin().unwrap();
            let (mut a, a_ids) = build(&txn, n1);
            let (b, b_ids) = build(&txn, n2);

            a.merge(&txn, b).unwrap();

            let popped = drain(&mut a, &txn);
            prop_assert_eq!(popped.len(), n1 + n2);
            let expected: BTreeSet<_> = a_ids.into_iter().chain(b_ids).collect();
            prop_assert_eq!(popped.into_iter().collect::<BTreeSet<_>>(), expected);
        }

        #[test]
        fn prop_merge_keeps_tail_usable(n1 in 7usize..20, n2 in 7usize..20, n3 in 7usize..20) {
            // Two merges in a row need the first merge's tail bookkeeping.
            let (_pool, store) = fresh_store();
            let txn = store.begin().unwrap();
            let (mut a, a_ids) = build(&txn, n1);
            let (b, b_ids) = build(&txn, n2);
            let (mut c, c_ids) = build(&txn, n3);

            a.merge(&txn, b).unwrap();
            c.merge(&txn, a).unwrap();

            let popped = drain(&mut c, &txn);
            prop_assert_eq!(popped.len(), n1 + n2 + n3);
            let expected: BTreeSet<_> =
                a_ids.into_iter().chain(b_ids).chain(c_ids).collect();
            prop_assert_eq!(popped.into_iter().collect::<BTreeSet<_>>(), expected);
        }
    }
}
