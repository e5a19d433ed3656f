//! In-memory implementation of the file collaborators.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Error, Result};
use crate::storage::{BlockFile, RandomAccessFile};

#[derive(Debug, Default)]
struct MemoryFileState {
    data: Vec<u8>,
    closed: bool,
    fail_reads: bool,
    fail_writes: bool,
    fail_syncs: bool,
    writes: u64,
    syncs: u64,
}

/// A file whose bytes live in memory.
///
/// Clones share the same bytes, so a test can hand one clone to a store and
/// keep another to inspect contents, count writes, or inject failures.
///
/// # Example
/// ```
/// use larchdb::storage::{BlockFile, MemoryFile};
///
/// let file = MemoryFile::new();
/// let mut handle = file.clone();
/// handle.write(&[7u8; 64], 64).unwrap();
/// assert_eq!(file.contents().len(), 128);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    state: Arc<Mutex<MemoryFileState>>,
}

impl MemoryFile {
    /// Create an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file holding `bytes`.
    pub fn with_contents(bytes: Vec<u8>) -> Self {
        let file = Self::new();
        file.state.lock().data = bytes;
        file
    }

    /// Copy of the current bytes.
    pub fn contents(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    /// Overwrite bytes in place, bypassing failure injection.
    pub fn patch(&self, offset: usize, bytes: &[u8]) {
        let mut state = self.state.lock();
        let end = offset + bytes.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[offset..end].copy_from_slice(bytes);
    }

    /// Make every later read fail with an I/O error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make every later write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make every later sync fail with an I/O error.
    pub fn set_fail_syncs(&self, fail: bool) {
        self.state.lock().fail_syncs = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.state.lock().writes
    }

    /// Number of successful syncs so far.
    pub fn sync_count(&self) -> u64 {
        self.state.lock().syncs
    }

    /// True once [`BlockFile::close`] was called on any clone.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        if state.fail_reads {
            return Err(injected("read"));
        }
        let start = usize::try_from(offset).map_err(|_| Error::DatabaseTooLarge)?;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::DatabaseTooLarge)?;
        if end > state.data.len() {
            return Err(Error::NotFound);
        }
        buf.copy_from_slice(&state.data[start..end]);
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        if state.fail_writes {
            return Err(injected("write"));
        }
        let start = usize::try_from(offset).map_err(|_| Error::DatabaseTooLarge)?;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::DatabaseTooLarge)?;
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(buf);
        state.writes += 1;
        Ok(())
    }

    fn sync_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        if state.fail_syncs {
            return Err(injected("sync"));
        }
        state.syncs += 1;
        Ok(())
    }

    fn close_file(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        state.closed = true;
        Ok(())
    }
}

fn injected(op: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {op} failure"),
    ))
}

impl BlockFile for MemoryFile {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(offset, buf)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.write_at(buf, offset)
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_all()
    }

    fn len(&mut self) -> Result<u64> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        Ok(state.data.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}

impl RandomAccessFile for MemoryFile {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(offset, buf)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.write_at(buf, offset)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_all()
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}
