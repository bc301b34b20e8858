//! Storage layer for record files.
//!
//! This module provides the page-based foundation the record layer builds on:
//!
//! - **PageManager**: Raw page I/O against one file (the file layer)
//! - **BufferPoolManager**: In-memory cache of pages with LRU eviction (the buffer layer)
//! - **DataPage**: Fixed-slot page format with an occupancy bitmap
//! - **FileHeader**: Record file metadata kept on page 0
//!
//! Nothing here knows about records or RIDs; it deals in pages and bytes.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
pub use disk::{PageManager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{DataPage, FileHeader, PageId, SlotLayout};
