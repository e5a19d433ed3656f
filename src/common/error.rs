//! Error types for LarchDB.

use thiserror::Error;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every status a storage-core operation can report besides success.
///
/// Errors are values: nothing panics across the API boundary for a runtime
/// condition. Assertions are reserved for caller bugs such as unbalanced pins.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a store's data or log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested store or page does not exist.
    #[error("not found")]
    NotFound,

    /// The resource is locked by another user.
    #[error("already locked")]
    AlreadyLocked,

    /// The resource exists and the caller asked for a fresh one.
    #[error("already exists")]
    AlreadyExists,

    /// Operation attempted after a terminal transition (closed store,
    /// committed or rolled back transaction).
    #[error("already closed")]
    AlreadyClosed,

    /// Every entry in the page pool is pinned.
    #[error("page pool is full")]
    PoolFull,

    /// An on-disk invariant was violated.
    #[error("data corrupted: {0}")]
    DataCorrupted(&'static str),

    /// A 64-bit on-disk quantity does not fit the host's address space.
    #[error("database too large")]
    DatabaseTooLarge,

    /// Pool or store options are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Error {
    /// True for I/O failures reported by a file collaborator.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
