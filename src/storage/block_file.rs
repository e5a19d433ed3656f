//! File collaborators consumed by stores.
//!
//! A store reads and writes its data file only through [`BlockFile`], and
//! keeps its log file behind [`RandomAccessFile`]. The storage core never
//! touches `std::fs` directly, which lets tests swap in
//! [`MemoryFile`](super::MemoryFile) and inject I/O failures.

use crate::common::Result;

/// Block-addressed file holding a store's pages.
///
/// Offsets and lengths passed by the storage core are always multiples of
/// the page size.
pub trait BlockFile: Send {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Reading past the end of the file fails with `Error::NotFound`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`, extending the file if needed.
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Make every completed write durable.
    fn sync(&mut self) -> Result<()>;

    /// Current file length in bytes.
    fn len(&mut self) -> Result<u64>;

    /// True if the file holds no bytes.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Release the file. Later calls fail with `Error::AlreadyClosed`.
    fn close(&mut self) -> Result<()>;
}

/// Byte-addressed file for the store's log.
///
/// Reserved for write-ahead logging; stores open it and close it but do not
/// write records yet.
pub trait RandomAccessFile: Send {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`.
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Push buffered writes to the operating system.
    fn flush(&mut self) -> Result<()>;

    /// Make every completed write durable.
    fn sync(&mut self) -> Result<()>;

    /// Release the file.
    fn close(&mut self) -> Result<()>;
}
