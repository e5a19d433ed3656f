//! Page - the byte buffer behind one pool entry.
//!
//! A [`Page`] is a raw, fixed-size byte array that serves as the unit of I/O
//! between a store's data file and memory. Its size is chosen once per pool
//! (`1 << page_shift`) rather than at compile time, so the buffer lives on
//! the heap.

/// A page of data.
///
/// Pool entries start out with an empty buffer and are sized with
/// [`Page::resize`] the first time the pool hands them out, so a pool only
/// pays for the pages it actually caches.
///
/// # Little-endian helpers
/// Every multi-byte on-disk field in LarchDB is a little-endian `u64`;
/// [`Page::read_u64`] and [`Page::write_u64`] are the only accessors the
/// page formats use.
///
/// # Example
/// ```
/// use larchdb::storage::Page;
///
/// let mut page = Page::new(64);
/// page.write_u64(8, 0xDEAD_BEEF);
/// assert_eq!(page.read_u64(8), 0xDEAD_BEEF);
/// assert_eq!(page.size(), 64);
/// ```
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Create a new zeroed page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Create a page with no buffer. Does not allocate.
    pub(crate) fn empty() -> Self {
        Self {
            data: Box::default(),
        }
    }

    /// Replace the buffer with a zeroed one of `size` bytes.
    pub(crate) fn resize(&mut self, size: usize) {
        if self.data.len() != size {
            self.data = vec![0u8; size].into_boxed_slice();
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Get the size of the page in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Read a little-endian `u64` at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + 8` exceeds the page size. Callers validate
    /// untrusted offsets before calling this.
    #[inline]
    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    }

    /// Write a little-endian `u64` at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + 8` exceeds the page size.
    #[inline]
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("size", &self.size()).finish()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}
