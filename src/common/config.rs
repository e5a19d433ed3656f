//! Configuration for page pools and stores.

use crate::common::{Error, Result};

/// Default page size exponent (4KB pages).
///
/// 4KB matches the OS page size on most systems, so a page write maps onto
/// whole device blocks.
pub const DEFAULT_PAGE_SHIFT: u8 = 12;

/// Smallest supported page size exponent (64-byte pages).
///
/// A page must hold the 40-byte store header and a free page list page with
/// at least a few entries.
pub const MIN_PAGE_SHIFT: u8 = 6;

/// Largest supported page size exponent.
///
/// The store header rejects exponents of 32 and above.
pub const MAX_PAGE_SHIFT: u8 = 31;

/// Default number of entries in a page pool.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Options for [`PagePool::new`](crate::PagePool::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Page size exponent; every store opened against the pool uses
    /// `1 << page_shift` byte pages.
    pub page_shift: u8,
    /// Maximum number of cached pages.
    pub capacity: usize,
}

impl PoolOptions {
    /// Options with the given page size exponent and capacity.
    pub fn new(page_shift: u8, capacity: usize) -> Self {
        Self {
            page_shift,
            capacity,
        }
    }

    /// Page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        1usize << self.page_shift
    }

    /// Check that the options describe a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.page_shift < MIN_PAGE_SHIFT {
            return Err(Error::InvalidConfig("page size below 64 bytes"));
        }
        if self.page_shift > MAX_PAGE_SHIFT || u32::from(self.page_shift) >= usize::BITS {
            return Err(Error::InvalidConfig("page size too large"));
        }
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("pool capacity must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SHIFT, DEFAULT_POOL_CAPACITY)
    }
}

/// Options for opening a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Bootstrap a new store when the data file is empty or missing.
    pub create_if_missing: bool,
    /// Fail with `AlreadyExists` when the data file already holds a store.
    pub error_if_exists: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
        }
    }
}
