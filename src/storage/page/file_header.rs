//! Record file header stored at the start of page 0.
//!
//! Four little-endian 32-bit integers:
//! `record_size | page_count | record_count | max_records_per_page`.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::data_page::{SlotLayout, BITMAP_CAPACITY, PAGE_HEADER_SIZE};
use crate::storage::page::PageId;
use crate::storage::PAGE_SIZE;
use byteorder::{ByteOrder, LittleEndian};

pub const HEADER_PAGE_ID: PageId = PageId(0);
pub const MAX_RECORD_SIZE: usize = 1024;
pub const FILE_HEADER_SIZE: usize = 16;

const RECORD_SIZE_OFFSET: usize = 0;
const PAGE_COUNT_OFFSET: usize = 4;
const RECORD_COUNT_OFFSET: usize = 8;
const MAX_RECORDS_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub record_size: u32,
    /// Allocated pages including the header page itself.
    pub page_count: u32,
    pub record_count: u32,
    pub max_records_per_page: u32,
}

impl FileHeader {
    /// Header for a freshly created file, or `None` if `record_size` is not
    /// in `1..=MAX_RECORD_SIZE`.
    pub fn new(record_size: usize) -> Option<Self> {
        if record_size == 0 || record_size > MAX_RECORD_SIZE {
            return None;
        }
        Some(Self {
            record_size: record_size as u32,
            page_count: 1,
            record_count: 0,
            max_records_per_page: Self::max_records_for(record_size),
        })
    }

    /// Slots per data page for the given record size.
    pub fn max_records_for(record_size: usize) -> u32 {
        let by_space = (PAGE_SIZE - PAGE_HEADER_SIZE) / record_size.max(1);
        by_space.min(BITMAP_CAPACITY) as u32
    }

    pub fn read_from(data: &[u8]) -> StorageResult<Self> {
        if data.len() < FILE_HEADER_SIZE {
            return Err(StorageError::Corrupted(format!(
                "file header needs {} bytes, got {}",
                FILE_HEADER_SIZE,
                data.len()
            )));
        }

        let header = Self {
            record_size: LittleEndian::read_u32(&data[RECORD_SIZE_OFFSET..]),
            page_count: LittleEndian::read_u32(&data[PAGE_COUNT_OFFSET..]),
            record_count: LittleEndian::read_u32(&data[RECORD_COUNT_OFFSET..]),
            max_records_per_page: LittleEndian::read_u32(&data[MAX_RECORDS_OFFSET..]),
        };
        header.validate()?;
        Ok(header)
    }

    pub fn write_to(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[RECORD_SIZE_OFFSET..], self.record_size);
        LittleEndian::write_u32(&mut data[PAGE_COUNT_OFFSET..], self.page_count);
        LittleEndian::write_u32(&mut data[RECORD_COUNT_OFFSET..], self.record_count);
        LittleEndian::write_u32(&mut data[MAX_RECORDS_OFFSET..], self.max_records_per_page);
    }

    pub fn layout(&self) -> SlotLayout {
        SlotLayout {
            record_size: self.record_size as usize,
            max_slots: self.max_records_per_page as u16,
        }
    }

    /// Data pages in ascending order (page 0 excluded).
    pub fn data_pages(&self) -> impl Iterator<Item = PageId> {
        (1..self.page_count).map(PageId)
    }

    pub fn is_data_page(&self, page_id: PageId) -> bool {
        page_id != HEADER_PAGE_ID && page_id.0 < self.page_count
    }

    fn validate(&self) -> StorageResult<()> {
        let record_size = self.record_size as usize;
        if record_size == 0 || record_size > MAX_RECORD_SIZE {
            return Err(StorageError::Corrupted(format!(
                "record size {} out of range",
                self.record_size
            )));
        }
        let expected = Self::max_records_for(record_size);
        if self.max_records_per_page != expected {
            return Err(StorageError::Corrupted(format!(
                "max records per page is {}, expected {} for record size {}",
                self.max_records_per_page, expected, self.record_size
            )));
        }
        if self.page_count == 0 {
            return Err(StorageError::Corrupted("page count is zero".to_string()));
        }
        Ok(())
    }
}
