//! Pool entry handle.

use std::fmt;

/// Index of an entry in a page pool's entry table.
///
/// The table never shrinks, so an index stays valid for the pool's lifetime.
/// Intrusive list links and the cache map hold `FrameId`s rather than pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(index: usize) -> Self {
        FrameId(index)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}
