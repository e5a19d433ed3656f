//! Disk File - `std::fs` backed implementation of the file collaborators.
//!
//! The [`DiskFile`] handles all direct file operations for one path:
//! - Positioned reads and writes
//! - Durability via `fsync()`
//! - Explicit close, after which every call fails `AlreadyClosed`

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::{Error, Result};
use crate::storage::{BlockFile, RandomAccessFile};

/// A file on disk, usable as a store's data file or log file.
///
/// # File Layout
/// As a data file, pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ header  │ root    │         │         │         │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0    1 << shift   ...       N << shift
/// ```
///
/// # Thread Safety
/// `DiskFile` is **single-threaded**. Stores wrap their files in a mutex.
///
/// # Durability
/// Writes are not synced individually; stores call [`BlockFile::sync`] when
/// a transaction commits.
pub struct DiskFile {
    file: Option<File>,
}

impl DiskFile {
    /// Create a new file.
    ///
    /// # Errors
    /// Returns `Error::AlreadyExists` if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(map_open_error)?;

        Ok(Self { file: Some(file) })
    }

    /// Open an existing file.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the file doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(map_open_error)?;

        Ok(Self { file: Some(file) })
    }

    /// Open an existing file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::AlreadyClosed)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self.file()?;
        let file_len = file.metadata()?.len();
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(Error::DatabaseTooLarge)?;
        if end > file_len {
            return Err(Error::NotFound);
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn sync_all(&mut self) -> Result<()> {
        self.file()?.sync_all()?;
        Ok(())
    }

    fn close_file(&mut self) -> Result<()> {
        let file = self.file.take().ok_or(Error::AlreadyClosed)?;
        file.sync_all()?;
        Ok(())
    }
}

fn map_open_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound,
        std::io::ErrorKind::AlreadyExists => Error::AlreadyExists,
        _ => Error::Io(err),
    }
}

impl BlockFile for DiskFile {
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
        Ok(self.file()?.metadata()?.len())
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}

impl RandomAccessFile for DiskFile {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(offset, buf)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.write_at(buf, offset)
    }

    fn flush(&mut self) -> Result<()> {
        self.file()?.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_all()
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}
