//! Store header - the fixed layout at the start of page 0.
//!
//! The header identifies the file as a LarchDB store, pins down the page
//! size the store was created with, and records the head of the store's
//! free page list.

use crate::common::config::MAX_PAGE_SHIFT;
use crate::common::{Error, PageId, Result};

/// Identifies any LarchDB file ("LarchDB!" read as a little-endian u64).
pub const GLOBAL_MAGIC: u64 = u64::from_le_bytes(*b"LarchDB!");

/// Identifies a store data file ("StoreDat" read as a little-endian u64).
pub const STORE_MAGIC: u64 = u64::from_le_bytes(*b"StoreDat");

/// The only format version this code reads or writes.
pub const FORMAT_VERSION: u64 = 0;

/// Metadata stored at the beginning of page 0.
///
/// # Layout (40 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     global magic (little-endian)
/// 8       8     store magic (little-endian)
/// 16      8     format version (must be 0)
/// 24      8     free page list head (0 = empty list)
/// 32      1     page size exponent (page size = 1 << exponent)
/// 33      7     reserved (must be zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// First page of the store's free page list.
    pub free_list_head: Option<PageId>,
    /// Page size exponent.
    pub page_shift: u8,
}

impl StoreHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 40;

    /// Offset of each field within the header.
    pub const OFFSET_GLOBAL_MAGIC: usize = 0;
    pub const OFFSET_STORE_MAGIC: usize = 8;
    pub const OFFSET_VERSION: usize = 16;
    pub const OFFSET_FREE_LIST_HEAD: usize = 24;
    pub const OFFSET_PAGE_SHIFT: usize = 32;
    pub const OFFSET_RESERVED: usize = 33;

    /// Header for a freshly bootstrapped store.
    pub fn new(page_shift: u8) -> Self {
        Self {
            free_list_head: None,
            page_shift,
        }
    }

    /// Page size described by this header.
    pub fn page_size(&self) -> usize {
        1usize << self.page_shift
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < StoreHeader::SIZE`.
    pub fn serialize(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for StoreHeader");

        write_u64(data, Self::OFFSET_GLOBAL_MAGIC, GLOBAL_MAGIC);
        write_u64(data, Self::OFFSET_STORE_MAGIC, STORE_MAGIC);
        write_u64(data, Self::OFFSET_VERSION, FORMAT_VERSION);
        write_u64(
            data,
            Self::OFFSET_FREE_LIST_HEAD,
            PageId::option_to_disk(self.free_list_head),
        );
        data[Self::OFFSET_PAGE_SHIFT] = self.page_shift;
        data[Self::OFFSET_RESERVED..Self::SIZE].fill(0);
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Errors
    /// `Error::DataCorrupted` if the slice is too short, a magic or the
    /// version does not match, the page size exponent is out of range, or a
    /// reserved byte is set.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::DataCorrupted("store header truncated"));
        }
        if read_u64(data, Self::OFFSET_GLOBAL_MAGIC) != GLOBAL_MAGIC {
            return Err(Error::DataCorrupted("not a LarchDB file"));
        }
        if read_u64(data, Self::OFFSET_STORE_MAGIC) != STORE_MAGIC {
            return Err(Error::DataCorrupted("not a store data file"));
        }
        if read_u64(data, Self::OFFSET_VERSION) != FORMAT_VERSION {
            return Err(Error::DataCorrupted("unsupported store format version"));
        }

        let page_shift = data[Self::OFFSET_PAGE_SHIFT];
        if page_shift > MAX_PAGE_SHIFT {
            return Err(Error::DataCorrupted("page size exponent out of range"));
        }
        if data[Self::OFFSET_RESERVED..Self::SIZE].iter().any(|&b| b != 0) {
            return Err(Error::DataCorrupted("store header reserved bytes are set"));
        }

        Ok(Self {
            free_list_head: PageId::from_disk(read_u64(data, Self::OFFSET_FREE_LIST_HEAD)),
            page_shift,
        })
    }
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn write_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
