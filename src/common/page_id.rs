//! Page identifier type.

use std::fmt;

/// Identifies a page inside one store's data file.
///
/// Page N lives at byte offset `N << page_shift`. Page 0 always holds the
/// store header, so the on-disk value 0 doubles as "no page" in free list
/// links and the header's free list head. In memory that sentinel is
/// spelled `Option<PageId>`; [`PageId::to_disk`] and [`PageId::from_disk`]
/// convert at the boundary.
///
/// # Example
/// ```
/// use larchdb::PageId;
///
/// let page_id = PageId::new(42);
/// assert_eq!(PageId::from_disk(page_id.to_disk()), Some(page_id));
/// assert_eq!(PageId::from_disk(0), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// The store header page.
    pub const HEADER: PageId = PageId(0);

    /// The root page written when a store is bootstrapped.
    pub const ROOT: PageId = PageId(1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Decode an on-disk page reference, where 0 means "none".
    #[inline]
    pub fn from_disk(raw: u64) -> Option<PageId> {
        if raw == 0 {
            None
        } else {
            Some(PageId(raw))
        }
    }

    /// Encode this page as an on-disk page reference.
    #[inline]
    pub fn to_disk(self) -> u64 {
        self.0
    }

    /// Encode an optional page reference, mapping `None` to 0.
    #[inline]
    pub fn option_to_disk(page_id: Option<PageId>) -> u64 {
        page_id.map_or(0, PageId::to_disk)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_disk_encoding() {
        assert_eq!(PageId::from_disk(0), None);
        assert_eq!(PageId::from_disk(7), Some(PageId::new(7)));
        assert_eq!(PageId::option_to_disk(None), 0);
        assert_eq!(PageId::option_to_disk(Some(PageId::new(9))), 9);
    }

    #[test]
    fn test_reserved_pages() {
        assert_eq!(PageId::from_disk(PageId::HEADER.to_disk()), None);
        assert_eq!(PageId::ROOT, PageId::new(1));
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(5) > PageId::new(3));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
    }
}
