use crate::access::error::{RecordError, RecordResult};
use crate::access::rid::{Record, Rid};
use crate::access::scan::RecordScan;
use crate::storage::buffer::{BufferPoolManager, PageWriteGuard};
use crate::storage::error::StorageError;
use crate::storage::page::{DataPage, FileHeader, PageId, HEADER_PAGE_ID};
use log::{debug, warn};
use std::path::PathBuf;

/// An open record file.
///
/// Owns the buffer pool bound to the file. Every operation reads the file
/// header from page 0 first, so the handle itself holds no cached metadata.
/// Mutating operations take `&mut self`: one writer per handle.
pub struct RecordFileHandle {
    buffer_pool: BufferPoolManager,
    closed: bool,
}

impl RecordFileHandle {
    /// Bind a handle to a buffer pool over an existing record file.
    pub(crate) fn open(buffer_pool: BufferPoolManager) -> RecordResult<Self> {
        let handle = Self {
            buffer_pool,
            closed: false,
        };
        // Reject files whose header does not parse
        handle.header()?;
        Ok(handle)
    }

    pub fn path(&self) -> PathBuf {
        self.buffer_pool.path()
    }

    pub fn header(&self) -> RecordResult<FileHeader> {
        let guard = self.buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        Ok(FileHeader::read_from(&guard[..])?)
    }

    pub fn record_size(&self) -> RecordResult<usize> {
        Ok(self.header()?.record_size as usize)
    }

    pub fn page_count(&self) -> RecordResult<u32> {
        Ok(self.header()?.page_count)
    }

    pub fn record_count(&self) -> RecordResult<u32> {
        Ok(self.header()?.record_count)
    }

    pub fn max_records_per_page(&self) -> RecordResult<u32> {
        Ok(self.header()?.max_records_per_page)
    }

    /// Copy the record at `rid` out of its page.
    pub fn get_record(&self, rid: Rid) -> RecordResult<Record> {
        let header = self.header()?;
        check_rid(&header, rid)?;

        let guard = self.buffer_pool.fetch_page(rid.page_id)?;
        let page = DataPage::from_data(&guard[..], header.layout());
        if !page.is_occupied(rid.slot_id) {
            return Err(RecordError::SlotEmpty(rid));
        }
        Ok(Record::materialize(page.record(rid.slot_id)?, rid))
    }

    /// Store `data` in the first free slot of the file, appending a data page
    /// when every existing page is full.
    pub fn insert_record(&mut self, data: &[u8]) -> RecordResult<Rid> {
        let mut header_guard = self.buffer_pool.fetch_page_write(HEADER_PAGE_ID)?;
        let mut header = FileHeader::read_from(&header_guard[..])?;
        check_size(&header, data.len())?;
        let layout = header.layout();

        let mut target = None;
        for page_id in header.data_pages() {
            let guard = self.buffer_pool.fetch_page_write(page_id)?;
            let page = DataPage::from_data(&guard[..], layout);
            if page.is_full() {
                continue;
            }
            if let Some(slot_id) = page.find_free_slot() {
                target = Some((page_id, slot_id, guard));
                break;
            }
        }

        let (page_id, slot_id, mut guard) = match target {
            Some(target) => target,
            None => self.append_data_page(&mut header)?,
        };

        let mut page = DataPage::from_data(&mut guard[..], layout);
        page.record_mut(slot_id)?.copy_from_slice(data);
        page.set_occupied(slot_id, true)?;
        guard.mark_dirty();

        header.record_count += 1;
        header.write_to(&mut header_guard[..]);
        header_guard.mark_dirty();

        Ok(Rid::new(page_id, slot_id))
    }

    /// Free the slot at `rid`. Deleting an empty slot is an error.
    pub fn delete_record(&mut self, rid: Rid) -> RecordResult<()> {
        let mut header_guard = self.buffer_pool.fetch_page_write(HEADER_PAGE_ID)?;
        let mut header = FileHeader::read_from(&header_guard[..])?;
        check_rid(&header, rid)?;

        let mut guard = self.buffer_pool.fetch_page_write(rid.page_id)?;
        let mut page = DataPage::from_data(&mut guard[..], header.layout());
        if !page.is_occupied(rid.slot_id) {
            return Err(RecordError::SlotEmpty(rid));
        }
        // Record bytes stay in place; only the bit defines liveness
        page.set_occupied(rid.slot_id, false)?;
        guard.mark_dirty();

        header.record_count = header.record_count.saturating_sub(1);
        header.write_to(&mut header_guard[..]);
        header_guard.mark_dirty();

        Ok(())
    }

    /// Overwrite a live record in place with the payload of `record`.
    pub fn update_record(&mut self, record: &Record) -> RecordResult<()> {
        let rid = record.rid()?;
        let data = record.payload()?;

        let header = self.header()?;
        check_rid(&header, rid)?;
        check_size(&header, data.len())?;

        let mut guard = self.buffer_pool.fetch_page_write(rid.page_id)?;
        let mut page = DataPage::from_data(&mut guard[..], header.layout());
        if !page.is_occupied(rid.slot_id) {
            return Err(RecordError::SlotEmpty(rid));
        }
        page.record_mut(rid.slot_id)?.copy_from_slice(data);
        guard.mark_dirty();

        Ok(())
    }

    /// Iterate over every live record in RID order.
    pub fn scan(&self) -> RecordResult<RecordScan<'_>> {
        let header = self.header()?;
        Ok(RecordScan::new(&self.buffer_pool, &header))
    }

    /// Write one page, or every dirty page when `page_id` is `None`, through
    /// to disk without closing the file.
    pub fn force_pages(&self, page_id: Option<PageId>) -> RecordResult<()> {
        match page_id {
            Some(page_id) => {
                let header = self.header()?;
                if page_id.0 >= header.page_count {
                    return Err(RecordError::PageOutOfRange {
                        page_id,
                        page_count: header.page_count,
                    });
                }
                self.buffer_pool.flush_page(page_id)?;
            }
            None => self.buffer_pool.flush_all()?,
        }
        Ok(())
    }

    /// Check that the file-level record count, every page's used slot count
    /// and the bitmaps all agree.
    pub fn check_integrity(&self) -> RecordResult<()> {
        let header = self.header()?;

        let file_pages = self.buffer_pool.num_pages()?;
        if file_pages < header.page_count {
            return Err(corrupted(format!(
                "header counts {} pages but the file holds {}",
                header.page_count, file_pages
            )));
        }

        let mut live = 0u64;
        for page_id in header.data_pages() {
            let guard = self.buffer_pool.fetch_page(page_id)?;
            let page = DataPage::from_data(&guard[..], header.layout());
            let bits = page.count_occupied();
            if bits != page.used_slot_count() {
                return Err(corrupted(format!(
                    "page {} has {} bits set but {} used slots",
                    page_id,
                    bits,
                    page.used_slot_count()
                )));
            }
            live += bits as u64;
        }

        if live != header.record_count as u64 {
            return Err(corrupted(format!(
                "header counts {} records but pages hold {}",
                header.record_count, live
            )));
        }
        Ok(())
    }

    /// Flush every buffered page and release the file.
    pub fn close(mut self) -> RecordResult<()> {
        self.buffer_pool.flush_all()?;
        self.closed = true;
        debug!("Closed record file {:?}", self.path());
        Ok(())
    }

    /// Claim page `page_count` as a fresh data page. A page already sitting
    /// there (left by an append whose header update never reached disk) is
    /// reused instead of growing the file again.
    fn append_data_page(
        &self,
        header: &mut FileHeader,
    ) -> RecordResult<(PageId, u16, PageWriteGuard)> {
        let file_pages = self.buffer_pool.num_pages()?;
        let next = PageId(header.page_count);
        let (page_id, mut guard) = if file_pages > header.page_count {
            debug!("Reusing unaccounted page {} of {:?}", next, self.path());
            (next, self.buffer_pool.fetch_page_write(next)?)
        } else if file_pages == header.page_count {
            self.buffer_pool.new_page()?
        } else {
            return Err(corrupted(format!(
                "header counts {} pages but the file holds {}",
                header.page_count, file_pages
            )));
        };
        if page_id != next {
            return Err(corrupted(format!(
                "appended page {} but header counts {} pages",
                page_id, header.page_count
            )));
        }

        let page = DataPage::init(&mut guard[..], header.layout());
        let slot_id = page
            .find_free_slot()
            .ok_or_else(|| corrupted(format!("new page {} has no free slot", page_id)))?;
        guard.mark_dirty();
        header.page_count += 1;

        debug!("Appended data page {} to {:?}", page_id, self.path());
        Ok((page_id, slot_id, guard))
    }
}

impl Drop for RecordFileHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Best effort flush on drop
        if let Err(e) = self.buffer_pool.flush_all() {
            warn!("Failed to flush record file on drop: {}", e);
        }
    }
}

fn check_rid(header: &FileHeader, rid: Rid) -> RecordResult<()> {
    if !header.is_data_page(rid.page_id) {
        return Err(RecordError::PageOutOfRange {
            page_id: rid.page_id,
            page_count: header.page_count,
        });
    }
    if rid.slot_id as u32 >= header.max_records_per_page {
        return Err(RecordError::SlotOutOfRange {
            slot_id: rid.slot_id,
            max_slots: header.max_records_per_page,
        });
    }
    Ok(())
}

fn check_size(header: &FileHeader, actual: usize) -> RecordResult<()> {
    let expected = header.record_size as usize;
    if actual != expected {
        return Err(RecordError::SizeMismatch { expected, actual });
    }
    Ok(())
}

fn corrupted(message: String) -> RecordError {
    RecordError::StorageFault(StorageError::Corrupted(message))
}
