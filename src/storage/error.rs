//! Storage layer error types.

use crate::storage::page::PageId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the file and buffer layers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("File already exists: {0:?}")]
    FileExists(PathBuf),

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Page buffer must be {expected} bytes, got {actual}")]
    InvalidPageBuffer { expected: usize, actual: usize },

    #[error("Invalid slot ID: {slot_id} (max: {max_slot})")]
    InvalidSlotId { slot_id: u16, max_slot: u16 },

    #[error("Buffer pool is full: all {frames} frames are pinned")]
    BufferPoolFull { frames: usize },

    #[error("Corrupted page data: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
