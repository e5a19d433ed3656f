//! On-disk layout of free page list pages.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     next entry offset: where the next pushed id goes
//! 8       8     next list page id (0 = last page in the list)
//! 16      8*N   page ids, entry i at 16 + 8*i
//! ```
//!
//! A page with next entry offset 16 holds no entries; a page whose offset
//! equals the page size is full. Both fields are read from untrusted disk
//! bytes, so every accessor that turns one into a buffer index validates it
//! first.

use crate::common::{Error, PageId, Result};
use crate::storage::Page;

/// Offset of the next-entry-offset field.
pub const NEXT_ENTRY_OFFSET_OFFSET: usize = 0;

/// Offset of the next-list-page field.
pub const NEXT_PAGE_ID_OFFSET: usize = 8;

/// Offset of the first entry.
pub const FIRST_ENTRY_OFFSET: usize = 16;

/// Size of one entry.
pub const ENTRY_SIZE: usize = 8;

/// Number of entries that fit on one list page.
#[inline]
pub fn capacity(page_size: usize) -> usize {
    (page_size - FIRST_ENTRY_OFFSET) / ENTRY_SIZE
}

/// True if `offset` cannot be a next-entry offset on a page of `page_size`.
///
/// Valid offsets are entry-aligned and lie in `FIRST_ENTRY_OFFSET..=page_size`.
#[inline]
pub fn is_corrupt_entry_offset(offset: u64, page_size: usize) -> bool {
    offset % ENTRY_SIZE as u64 != 0
        || offset < FIRST_ENTRY_OFFSET as u64
        || offset > page_size as u64
}

/// Validated next-entry offset of a list page.
pub fn next_entry_offset(page: &Page) -> Result<usize> {
    let raw = page.read_u64(NEXT_ENTRY_OFFSET_OFFSET);
    if is_corrupt_entry_offset(raw, page.size()) {
        return Err(Error::DataCorrupted("free page list offset out of range"));
    }
    // Bounded by the page size above, so the cast is lossless.
    Ok(raw as usize)
}

/// Store the next-entry offset of a list page.
pub fn set_next_entry_offset(page: &mut Page, offset: usize) {
    debug_assert!(!is_corrupt_entry_offset(offset as u64, page.size()));
    page.write_u64(NEXT_ENTRY_OFFSET_OFFSET, offset as u64);
}

/// Next list page, or `None` at the end of the chain.
pub fn next_page_id(page: &Page) -> Option<PageId> {
    PageId::from_disk(page.read_u64(NEXT_PAGE_ID_OFFSET))
}

/// Store the next list page.
pub fn set_next_page_id(page: &mut Page, next: Option<PageId>) {
    page.write_u64(NEXT_PAGE_ID_OFFSET, PageId::option_to_disk(next));
}

/// Number of entries stored before a validated `next_entry_offset`.
#[inline]
pub fn entry_count(next_entry_offset: usize) -> usize {
    (next_entry_offset - FIRST_ENTRY_OFFSET) / ENTRY_SIZE
}

/// Page id stored at `offset`, which must come from a validated page.
///
/// # Errors
/// `Error::DataCorrupted` for a zero entry: page 0 is the store header and
/// is never free.
pub fn entry(page: &Page, offset: usize) -> Result<PageId> {
    PageId::from_disk(page.read_u64(offset))
        .ok_or(Error::DataCorrupted("free page list holds the header page"))
}

/// Store a page id at `offset`.
pub fn set_entry(page: &mut Page, offset: usize, page_id: PageId) {
    page.write_u64(offset, page_id.to_disk());
}

/// Turn `page` into an empty list page pointing at `next`.
pub fn init_page(page: &mut Page, next: Option<PageId>) {
    set_next_entry_offset(page, FIRST_ENTRY_OFFSET);
    set_next_page_id(page, next);
}
