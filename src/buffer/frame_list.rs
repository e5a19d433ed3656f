//! Intrusive doubly-linked lists of frames.
//!
//! The pool keeps its free list, its LRU list and every transaction's list
//! of owned frames as [`FrameList`]s threaded through the frames' own link
//! slots. Insert, remove and pop are O(1) and never allocate.

use crate::buffer::frame::{Frame, ListKind};
use crate::common::FrameId;

/// Head/tail anchor of one intrusive list.
///
/// The list does not own its frames; every operation borrows the frame
/// arena it was built over. Front is the oldest entry, back the newest.
#[derive(Debug)]
pub(crate) struct FrameList {
    kind: ListKind,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

impl FrameList {
    pub(crate) fn new(kind: ListKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if `id` is linked through this list's slot.
    ///
    /// Only meaningful for lists that are the sole user of their slot, such
    /// as the free list while the frame is unassigned.
    #[inline]
    pub(crate) fn is_linked(&self, frames: &[Frame], id: FrameId) -> bool {
        frames[id.0].link(self.kind).linked
    }

    /// Append `id` at the back.
    ///
    /// # Panics
    /// Panics if the frame is already on a list of this kind.
    pub(crate) fn push_back(&mut self, frames: &mut [Frame], id: FrameId) {
        let kind = self.kind;
        {
            let link = frames[id.0].link_mut(kind);
            assert!(!link.linked, "{id} is already on a {kind:?} list");
            link.linked = true;
            link.prev = self.tail;
            link.next = None;
        }

        match self.tail {
            Some(tail) => frames[tail.0].link_mut(kind).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Unlink `id` from this list.
    ///
    /// The caller must know the frame is on this list and not on another
    /// list of the same kind.
    pub(crate) fn remove(&mut self, frames: &mut [Frame], id: FrameId) {
        let kind = self.kind;
        let link = *frames[id.0].link(kind);
        debug_assert!(link.linked, "{id} is not on a {kind:?} list");

        match link.prev {
            Some(prev) => frames[prev.0].link_mut(kind).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => frames[next.0].link_mut(kind).prev = link.prev,
            None => self.tail = link.prev,
        }

        *frames[id.0].link_mut(kind) = Default::default();
        self.len -= 1;
    }

    /// Unlink and return the front frame.
    pub(crate) fn pop_front(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        let head = self.head?;
        self.remove(frames, head);
        Some(head)
    }

    /// Frame ids from front to back.
    pub(crate) fn ids(&self, frames: &[Frame]) -> Vec<FrameId> {
        let mut ids = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = frames[id.0].link(self.kind).next;
        }
        ids
    }
}
