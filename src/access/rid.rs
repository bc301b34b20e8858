use crate::access::error::{RecordError, RecordResult};
use crate::storage::page::PageId;
use std::cmp::Ordering;
use std::fmt;

/// Address of a record within one record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl Rid {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl PartialOrd for Rid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.page_id
            .cmp(&other.page_id)
            .then(self.slot_id.cmp(&other.slot_id))
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}

/// Owned snapshot of one record's bytes and the RID it belongs to.
///
/// A `Record` never aliases a buffered page: changing it has no effect on the
/// file until it is passed to `update_record`. `Record::default()` is empty
/// and refuses both accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    contents: Option<(Rid, Box<[u8]>)>,
}

impl Record {
    pub fn new(rid: Rid, data: Vec<u8>) -> Self {
        Self {
            contents: Some((rid, data.into_boxed_slice())),
        }
    }

    /// Copy `src` out of a page into a new record.
    pub fn materialize(src: &[u8], rid: Rid) -> Self {
        Self {
            contents: Some((rid, src.into())),
        }
    }

    pub fn payload(&self) -> RecordResult<&[u8]> {
        self.contents
            .as_ref()
            .map(|(_, data)| &data[..])
            .ok_or(RecordError::EmptyRecord)
    }

    pub fn payload_mut(&mut self) -> RecordResult<&mut [u8]> {
        self.contents
            .as_mut()
            .map(|(_, data)| &mut data[..])
            .ok_or(RecordError::EmptyRecord)
    }

    pub fn rid(&self) -> RecordResult<Rid> {
        self.contents
            .as_ref()
            .map(|(rid, _)| *rid)
            .ok_or(RecordError::EmptyRecord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rid_equality() {
        let rid1 = Rid::new(PageId(1), 2);
        let rid2 = Rid::new(PageId(1), 2);
        let rid3 = Rid::new(PageId(1), 3);
        let rid4 = Rid::new(PageId(2), 2);

        assert_eq!(rid1, rid2);
        assert_ne!(rid1, rid3);
        assert_ne!(rid1, rid4);
    }

    #[test]
    fn test_rid_ordering() {
        let rid1 = Rid::new(PageId(1), 5);
        let rid2 = Rid::new(PageId(1), 10);
        let rid3 = Rid::new(PageId(2), 3);

        assert!(rid1 < rid2);
        assert!(rid2 < rid3);
        assert!(rid1 < rid3);
    }

    #[test]
    fn test_rid_display() {
        assert_eq!(Rid::new(PageId(100), 25).to_string(), "(100, 25)");
    }

    #[test]
    fn test_materialize_copies() -> RecordResult<()> {
        let mut page_bytes = vec![1u8, 2, 3, 4];
        let rid = Rid::new(PageId(1), 0);
        let record = Record::materialize(&page_bytes[1..3], rid);

        page_bytes[1] = 99;
        assert_eq!(record.payload()?, &[2, 3]);
        assert_eq!(record.rid()?, rid);

        Ok(())
    }

    #[test]
    fn test_payload_mut() -> RecordResult<()> {
        let mut record = Record::new(Rid::new(PageId(3), 7), vec![0; 4]);
        record.payload_mut()?[0] = 5;
        assert_eq!(record.payload()?, &[5, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_empty_record() {
        let mut record = Record::default();
        assert!(matches!(record.payload(), Err(RecordError::EmptyRecord)));
        assert!(matches!(record.payload_mut(), Err(RecordError::EmptyRecord)));
        assert!(matches!(record.rid(), Err(RecordError::EmptyRecord)));
    }
}
