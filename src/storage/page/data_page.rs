//! Fixed-slot data page with an occupancy bitmap.
//!
//! Layout (all integers little endian):
//!
//! ```text
//! 0        4                         96
//! | used   | bitmap: 23 x u32 words  | slot 0 | slot 1 | ... | slot n-1 |
//! ```
//!
//! Slot `s` is tracked by bit `31 - s % 32` of word `s / 32`; a set bit means
//! the slot holds a live record. `used` caches the number of set bits.

use crate::storage::error::{StorageError, StorageResult};
use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;

/// Bytes reserved at the start of every data page before slot 0.
pub const PAGE_HEADER_SIZE: usize = 96;
pub const BITMAP_WORDS: usize = 23;
/// Number of slots the bitmap can track.
pub const BITMAP_CAPACITY: usize = BITMAP_WORDS * 32;

const USED_SLOT_COUNT_OFFSET: usize = 0;
const BITMAP_OFFSET: usize = 4;

/// Record size and slot count shared by every data page of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub record_size: usize,
    pub max_slots: u16,
}

impl SlotLayout {
    /// Byte range of `slot_id` within a page.
    pub fn slot_range(&self, slot_id: u16) -> StorageResult<Range<usize>> {
        if slot_id >= self.max_slots {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: self.max_slots,
            });
        }
        let start = PAGE_HEADER_SIZE + slot_id as usize * self.record_size;
        Ok(start..start + self.record_size)
    }
}

/// Typed view over the bytes of one data page.
///
/// Works over anything that exposes the page as a byte slice: a buffer pool
/// guard, a plain array in tests. Mutators are only available when the
/// underlying bytes are mutable.
pub struct DataPage<T> {
    data: T,
    layout: SlotLayout,
}

impl<T: AsRef<[u8]>> DataPage<T> {
    pub fn from_data(data: T, layout: SlotLayout) -> Self {
        Self { data, layout }
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn used_slot_count(&self) -> u32 {
        LittleEndian::read_u32(&self.bytes()[USED_SLOT_COUNT_OFFSET..])
    }

    pub fn is_full(&self) -> bool {
        self.used_slot_count() >= self.slot_limit() as u32
    }

    pub fn is_occupied(&self, slot_id: u16) -> bool {
        let slot = slot_id as usize;
        if slot >= BITMAP_CAPACITY {
            return false;
        }
        self.word(slot / 32) & bit_mask(slot) != 0
    }

    /// First free slot in ascending order, or `None` when the page is full.
    pub fn find_free_slot(&self) -> Option<u16> {
        let limit = self.slot_limit();
        for index in 0..BITMAP_WORDS {
            let base = index * 32;
            if base >= limit {
                break;
            }
            let free = !self.word(index);
            if free == 0 {
                continue;
            }
            let slot = base + free.leading_zeros() as usize;
            return (slot < limit).then_some(slot as u16);
        }
        None
    }

    /// Occupied slots in ascending order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.slot_limit() as u16).filter(move |&slot| self.is_occupied(slot))
    }

    /// Population count of the whole bitmap.
    pub fn count_occupied(&self) -> u32 {
        (0..BITMAP_WORDS).map(|index| self.word(index).count_ones()).sum()
    }

    pub fn record(&self, slot_id: u16) -> StorageResult<&[u8]> {
        let range = self.checked_range(slot_id)?;
        Ok(&self.bytes()[range])
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn slot_limit(&self) -> usize {
        (self.layout.max_slots as usize).min(BITMAP_CAPACITY)
    }

    fn word(&self, index: usize) -> u32 {
        let offset = BITMAP_OFFSET + index * 4;
        LittleEndian::read_u32(&self.bytes()[offset..offset + 4])
    }

    fn checked_range(&self, slot_id: u16) -> StorageResult<Range<usize>> {
        let range = self.layout.slot_range(slot_id)?;
        if range.end > self.bytes().len() {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: self.layout.max_slots,
            });
        }
        Ok(range)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DataPage<T> {
    /// Format `data` as an empty data page: cleared bitmap, zero used slots.
    pub fn init(mut data: T, layout: SlotLayout) -> Self {
        data.as_mut()[..PAGE_HEADER_SIZE].fill(0);
        Self { data, layout }
    }

    /// Set or clear the occupancy bit, keeping the used slot count in step.
    pub fn set_occupied(&mut self, slot_id: u16, occupied: bool) -> StorageResult<()> {
        let slot = slot_id as usize;
        if slot >= self.slot_limit() {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: self.layout.max_slots,
            });
        }
        if self.is_occupied(slot_id) == occupied {
            return Ok(());
        }

        let index = slot / 32;
        let word = self.word(index) ^ bit_mask(slot);
        self.set_word(index, word);

        let used = self.used_slot_count();
        let used = if occupied {
            used + 1
        } else {
            used.saturating_sub(1)
        };
        LittleEndian::write_u32(&mut self.bytes_mut()[USED_SLOT_COUNT_OFFSET..], used);
        Ok(())
    }

    pub fn record_mut(&mut self, slot_id: u16) -> StorageResult<&mut [u8]> {
        let range = self.checked_range(slot_id)?;
        Ok(&mut self.bytes_mut()[range])
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn set_word(&mut self, index: usize, word: u32) {
        let offset = BITMAP_OFFSET + index * 4;
        LittleEndian::write_u32(&mut self.bytes_mut()[offset..offset + 4], word);
    }
}

fn bit_mask(slot: usize) -> u32 {
    1 << (31 - slot % 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PAGE_SIZE;

    fn layout(record_size: usize, max_slots: u16) -> SlotLayout {
        SlotLayout {
            record_size,
            max_slots,
        }
    }

    #[test]
    fn test_init_clears_header() {
        let mut data = Box::new([0xFFu8; PAGE_SIZE]);
        let page = DataPage::init(&mut data[..], layout(16, 100));

        assert_eq!(page.used_slot_count(), 0);
        assert_eq!(page.count_occupied(), 0);
        assert_eq!(page.find_free_slot(), Some(0));
        // Slot bytes are left alone
        assert_eq!(data[PAGE_HEADER_SIZE], 0xFF);
    }

    #[test]
    fn test_find_free_slot_first_fit() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(16, 100));

        for slot in 0..3 {
            assert_eq!(page.find_free_slot(), Some(slot));
            page.set_occupied(slot, true)?;
        }
        page.set_occupied(1, false)?;
        assert_eq!(page.find_free_slot(), Some(1));

        Ok(())
    }

    #[test]
    fn test_set_occupied_tracks_count() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(8, 64));

        page.set_occupied(5, true)?;
        page.set_occupied(5, true)?;
        assert_eq!(page.used_slot_count(), 1);
        assert!(page.is_occupied(5));

        page.set_occupied(40, true)?;
        assert_eq!(page.used_slot_count(), 2);

        page.set_occupied(5, false)?;
        page.set_occupied(5, false)?;
        assert_eq!(page.used_slot_count(), 1);
        assert!(!page.is_occupied(5));
        assert_eq!(page.count_occupied(), 1);

        Ok(())
    }

    #[test]
    fn test_full_page_across_word_boundary() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(100, 40));

        for slot in 0..40 {
            page.set_occupied(slot, true)?;
        }
        assert!(page.is_full());
        assert_eq!(page.find_free_slot(), None);

        page.set_occupied(33, false)?;
        assert!(!page.is_full());
        assert_eq!(page.find_free_slot(), Some(33));

        Ok(())
    }

    #[test]
    fn test_bitmap_capacity_bounds_slots() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(1, BITMAP_CAPACITY as u16));

        for slot in 0..BITMAP_CAPACITY as u16 {
            page.set_occupied(slot, true)?;
        }
        assert_eq!(page.find_free_slot(), None);
        assert_eq!(page.count_occupied(), BITMAP_CAPACITY as u32);
        assert!(page.set_occupied(BITMAP_CAPACITY as u16, true).is_err());
        assert!(!page.is_occupied(BITMAP_CAPACITY as u16));

        Ok(())
    }

    #[test]
    fn test_bit_order_on_disk() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        {
            let mut page = DataPage::init(&mut data[..], layout(16, 100));
            page.set_occupied(0, true)?;
            page.set_occupied(33, true)?;
        }

        assert_eq!(LittleEndian::read_u32(&data[0..4]), 2);
        // Slot 0 is the top bit of word 0, slot 33 the second bit of word 1
        assert_eq!(LittleEndian::read_u32(&data[4..8]), 0x8000_0000);
        assert_eq!(LittleEndian::read_u32(&data[8..12]), 0x4000_0000);

        Ok(())
    }

    #[test]
    fn test_record_ranges() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(16, 10));

        page.record_mut(2)?.copy_from_slice(&[7u8; 16]);
        assert_eq!(page.record(2)?, &[7u8; 16]);
        assert_eq!(page.record(1)?, &[0u8; 16]);

        let result = page.record(10);
        assert!(matches!(
            result,
            Err(StorageError::InvalidSlotId {
                slot_id: 10,
                max_slot: 10
            })
        ));

        assert_eq!(
            layout(16, 10).slot_range(2)?,
            PAGE_HEADER_SIZE + 32..PAGE_HEADER_SIZE + 48
        );

        Ok(())
    }

    #[test]
    fn test_record_past_buffer_end() {
        // A layout that claims more slots than the buffer holds
        let data = vec![0u8; PAGE_HEADER_SIZE + 32];
        let page = DataPage::from_data(&data[..], layout(16, 4));

        assert!(page.record(1).is_ok());
        assert!(page.record(2).is_err());
    }

    #[test]
    fn test_occupied_slots() -> StorageResult<()> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut page = DataPage::init(&mut data[..], layout(16, 100));

        for slot in [3, 31, 32, 99] {
            page.set_occupied(slot, true)?;
        }
        let slots: Vec<u16> = page.occupied_slots().collect();
        assert_eq!(slots, vec![3, 31, 32, 99]);

        Ok(())
    }
}
