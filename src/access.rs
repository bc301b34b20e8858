//! Record layer: fixed-size records addressed by RID.
//!
//! This module maps logical records onto the data pages of a record file:
//!
//! - **RecordManager**: Creates, opens, closes and destroys record files
//! - **RecordFileHandle**: Fetch, insert, delete and update records of one open file
//! - **Rid / Record**: Record addresses and owned record snapshots
//! - **RecordScan**: Sequential scan over every live record
//!
//! Callers never see pages or buffers; every record handed out is a copy.

pub mod error;
pub mod file_handle;
pub mod manager;
pub mod rid;
pub mod scan;

pub use error::{RecordError, RecordResult};
pub use file_handle::RecordFileHandle;
pub use manager::{RecordManager, RecordManagerConfig};
pub use rid::{Record, Rid};
pub use scan::RecordScan;
