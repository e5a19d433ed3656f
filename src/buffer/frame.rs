//! Frame - the control block of one pool entry.
//!
//! A [`Frame`] carries everything the pool needs to manage an entry except
//! the page bytes themselves, which live next to it in their own `RwLock`:
//! - Which (store, page) is cached, if any
//! - Pin count for reference counting
//! - Dirty flag, owning transaction and whether that owner holds a pin
//! - Intrusive links for the pool's free/LRU lists and ownership lists

use std::fmt;

use crate::common::{FrameId, PageId, StoreId, TxnId};

/// Cache key of a pool entry: a page inside one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub store: StoreId,
    pub page: PageId,
}

impl PageKey {
    #[inline]
    pub fn new(store: StoreId, page: PageId) -> Self {
        Self { store, page }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.page)
    }
}

/// Which intrusive list a link slot belongs to.
///
/// An idle frame sits on exactly one cache list (free or LRU), and an
/// assigned frame sits on exactly one ownership list, so two slots suffice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    Cache = 0,
    Owner = 1,
}

/// Intrusive doubly-linked list node, addressed by frame index.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Link {
    pub(crate) prev: Option<FrameId>,
    pub(crate) next: Option<FrameId>,
    pub(crate) linked: bool,
}

/// Control block for one pool entry.
///
/// Frames are only touched while the pool's state lock is held, so none of
/// the fields need interior mutability.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pin_count: u32,
    dirty: bool,
    key: Option<PageKey>,
    owner: Option<TxnId>,
    /// Set while the owning transaction holds a pin of its own.
    owner_pin: bool,
    links: [Link; 2],
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the pin count would overflow.
    #[inline]
    pub(crate) fn pin(&mut self) -> u32 {
        assert!(self.pin_count < u32::MAX, "pin count overflow");
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub(crate) fn unpin(&mut self) -> u32 {
        assert!(self.pin_count > 0, "pin count underflow");
        self.pin_count -= 1;
        self.pin_count
    }

    #[inline]
    pub(crate) fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub(crate) fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    // ========================================================================
    // Assignment and ownership
    // ========================================================================

    #[inline]
    pub(crate) fn key(&self) -> Option<PageKey> {
        self.key
    }

    #[inline]
    pub(crate) fn is_assigned(&self) -> bool {
        self.key.is_some()
    }

    #[inline]
    pub(crate) fn set_key(&mut self, key: Option<PageKey>) {
        self.key = key;
    }

    #[inline]
    pub(crate) fn owner(&self) -> Option<TxnId> {
        self.owner
    }

    #[inline]
    pub(crate) fn set_owner(&mut self, owner: Option<TxnId>) {
        self.owner = owner;
    }

    #[inline]
    pub(crate) fn has_owner_pin(&self) -> bool {
        self.owner_pin
    }

    #[inline]
    pub(crate) fn set_owner_pin(&mut self, owner_pin: bool) {
        self.owner_pin = owner_pin;
    }

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Check if the frame can be evicted.
    #[inline]
    pub(crate) fn is_evictable(&self) -> bool {
        self.is_assigned() && !self.is_pinned()
    }

    // ========================================================================
    // Intrusive links
    // ========================================================================

    #[inline]
    pub(crate) fn link(&self, kind: ListKind) -> &Link {
        &self.links[kind as usize]
    }

    #[inline]
    pub(crate) fn link_mut(&mut self, kind: ListKind) -> &mut Link {
        &mut self.links[kind as usize]
    }
}
