pub mod data_page;
pub mod file_header;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub use data_page::{DataPage, SlotLayout};
pub use file_header::{FileHeader, HEADER_PAGE_ID};
