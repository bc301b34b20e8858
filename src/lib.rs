pub mod access;
pub mod storage;

pub use access::{Record, RecordError, RecordFileHandle, RecordManager, RecordResult, Rid};
pub use storage::PageId;
