//! Sequential scan over the live records of a record file.

use crate::access::error::RecordResult;
use crate::access::rid::{Record, Rid};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::{DataPage, FileHeader, PageId, SlotLayout};
use std::collections::VecDeque;
use std::ops::Range;

/// Iterator over every live record in ascending RID order.
///
/// Records are copied out one page at a time; no page stays pinned between
/// calls to `next`. The set of pages is fixed when the scan starts.
pub struct RecordScan<'a> {
    buffer_pool: &'a BufferPoolManager,
    layout: SlotLayout,
    pages: Range<u32>,
    pending: VecDeque<Record>,
}

impl<'a> RecordScan<'a> {
    pub(crate) fn new(buffer_pool: &'a BufferPoolManager, header: &FileHeader) -> Self {
        Self {
            buffer_pool,
            layout: header.layout(),
            pages: 1..header.page_count,
            pending: VecDeque::new(),
        }
    }

    fn load_page(&mut self, page_id: PageId) -> RecordResult<()> {
        let guard = self.buffer_pool.fetch_page(page_id)?;
        let page = DataPage::from_data(&guard[..], self.layout);

        for slot_id in page.occupied_slots() {
            let rid = Rid::new(page_id, slot_id);
            self.pending
                .push_back(Record::materialize(page.record(slot_id)?, rid));
        }
        Ok(())
    }
}

impl Iterator for RecordScan<'_> {
    type Item = RecordResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }

            let page_id = PageId(self.pages.next()?);
            if let Err(e) = self.load_page(page_id) {
                // Stop after the first failure
                self.pending.clear();
                self.pages = self.pages.end..self.pages.end;
                return Some(Err(e));
            }
        }
    }
}
