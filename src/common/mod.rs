//! Common types and utilities shared across LarchDB.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and option structs
//! - Error types
//! - Identifiers (PageId, FrameId, StoreId, TxnId)

pub mod config;
pub mod error;
mod frame_id;
mod ids;
mod page_id;

pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use ids::{StoreId, TxnId};
pub use page_id::PageId;
