//! Record layer error types.

use crate::access::rid::Rid;
use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by record file operations.
///
/// An operation that fails has made no change to the file.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Invalid record size: {size} (must be between 1 and {max})")]
    InvalidRecordSize { size: usize, max: usize },

    #[error("Record file not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Failed to open record file {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("Page {page_id} is not a data page (page count: {page_count})")]
    PageOutOfRange { page_id: PageId, page_count: u32 },

    #[error("Slot {slot_id} out of range (max: {max_slots})")]
    SlotOutOfRange { slot_id: u16, max_slots: u32 },

    #[error("No record at {0}")]
    SlotEmpty(Rid),

    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Record is empty")]
    EmptyRecord,

    #[error("Storage fault: {0}")]
    StorageFault(#[from] StorageError),
}

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;
