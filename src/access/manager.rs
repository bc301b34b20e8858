//! Record file lifecycle: create, open, close, destroy.

use crate::access::error::{RecordError, RecordResult};
use crate::access::file_handle::RecordFileHandle;
use crate::storage::buffer::lru::LruReplacer;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::PageManager;
use crate::storage::error::StorageError;
use crate::storage::page::file_header::MAX_RECORD_SIZE;
use crate::storage::page::{FileHeader, HEADER_PAGE_ID};
use log::{info, warn};
use std::path::Path;

/// Smallest pool that can serve an insert: the header page and one data page
/// are pinned together.
pub const MIN_BUFFER_POOL_FRAMES: usize = 2;

/// Record manager configuration.
#[derive(Debug, Clone)]
pub struct RecordManagerConfig {
    /// Frames in the buffer pool of each open file.
    pub buffer_pool_frames: usize,
}

impl Default for RecordManagerConfig {
    fn default() -> Self {
        RecordManagerConfig {
            buffer_pool_frames: 64,
        }
    }
}

/// Creates, opens, closes and destroys record files.
#[derive(Debug, Clone, Default)]
pub struct RecordManager {
    config: RecordManagerConfig,
}

impl RecordManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut config: RecordManagerConfig) -> Self {
        if config.buffer_pool_frames < MIN_BUFFER_POOL_FRAMES {
            warn!(
                "Buffer pool of {} frames is too small, using {}",
                config.buffer_pool_frames, MIN_BUFFER_POOL_FRAMES
            );
            config.buffer_pool_frames = MIN_BUFFER_POOL_FRAMES;
        }
        Self { config }
    }

    pub fn config(&self) -> &RecordManagerConfig {
        &self.config
    }

    /// Create a record file holding records of exactly `record_size` bytes.
    ///
    /// Only the header page is written; the first data page is added by the
    /// first insert.
    pub fn create_file(&self, path: &Path, record_size: usize) -> RecordResult<()> {
        let header = FileHeader::new(record_size).ok_or(RecordError::InvalidRecordSize {
            size: record_size,
            max: MAX_RECORD_SIZE,
        })?;

        let page_manager = PageManager::create(path)?;
        if let Err(e) = self.write_header(page_manager, &header) {
            // Don't leave a half-written file behind
            if let Err(cleanup) = PageManager::destroy(path) {
                warn!("Failed to remove {:?} after create error: {}", path, cleanup);
            }
            return Err(e);
        }

        info!(
            "Created record file {:?} (record size {}, {} records per page)",
            path, header.record_size, header.max_records_per_page
        );
        Ok(())
    }

    pub fn open_file(&self, path: &Path) -> RecordResult<RecordFileHandle> {
        let page_manager = PageManager::open(path).map_err(|e| match e {
            StorageError::FileNotFound(path) => RecordError::FileNotFound(path),
            source => RecordError::OpenFailed {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let handle = RecordFileHandle::open(self.buffer_pool(page_manager))?;
        info!("Opened record file {:?}", path);
        Ok(handle)
    }

    /// Flush every page of `handle` and close the file.
    pub fn close_file(&self, handle: RecordFileHandle) -> RecordResult<()> {
        handle.close()
    }

    /// Remove a record file. It must not be open.
    pub fn destroy_file(&self, path: &Path) -> RecordResult<()> {
        PageManager::destroy(path).map_err(|e| match e {
            StorageError::FileNotFound(path) => RecordError::FileNotFound(path),
            other => RecordError::StorageFault(other),
        })?;
        info!("Destroyed record file {:?}", path);
        Ok(())
    }

    fn write_header(&self, page_manager: PageManager, header: &FileHeader) -> RecordResult<()> {
        let buffer_pool = self.buffer_pool(page_manager);
        let (page_id, mut guard) = buffer_pool.new_page()?;
        if page_id != HEADER_PAGE_ID {
            return Err(RecordError::StorageFault(StorageError::Corrupted(format!(
                "new file started at page {}",
                page_id
            ))));
        }
        header.write_to(&mut guard[..]);
        guard.mark_dirty();
        drop(guard);

        buffer_pool.flush_all()?;
        Ok(())
    }

    fn buffer_pool(&self, page_manager: PageManager) -> BufferPoolManager {
        let frames = self.config.buffer_pool_frames;
        BufferPoolManager::new(page_manager, Box::new(LruReplacer::new(frames)), frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_open() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.rm");
        let manager = RecordManager::new();

        manager.create_file(&path, 16)?;
        assert!(path.exists());

        let handle = manager.open_file(&path)?;
        let header = handle.header()?;
        assert_eq!(header.record_size, 16);
        assert_eq!(header.page_count, 1);
        assert_eq!(header.record_count, 0);
        assert_eq!(header.max_records_per_page, 506);
        assert_eq!(handle.path(), path);

        manager.close_file(handle)?;
        Ok(())
    }

    #[test]
    fn test_invalid_record_size() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.rm");
        let manager = RecordManager::new();

        let result = manager.create_file(&path, MAX_RECORD_SIZE + 1);
        assert!(matches!(
            result,
            Err(RecordError::InvalidRecordSize { size: 1025, max: 1024 })
        ));
        assert!(matches!(
            manager.create_file(&path, 0),
            Err(RecordError::InvalidRecordSize { .. })
        ));
        assert!(!path.exists());

        manager.create_file(&path, MAX_RECORD_SIZE)?;
        Ok(())
    }

    #[test]
    fn test_create_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.rm");
        let manager = RecordManager::new();

        manager.create_file(&path, 8)?;
        let result = manager.create_file(&path, 8);
        assert!(matches!(
            result,
            Err(RecordError::StorageFault(StorageError::FileExists(_)))
        ));

        // The existing file is untouched
        assert_eq!(manager.open_file(&path)?.record_size()?, 8);
        Ok(())
    }

    #[test]
    fn test_open_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let result = RecordManager::new().open_file(&dir.path().join("missing.rm"));
        assert!(matches!(result, Err(RecordError::FileNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_open_non_record_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.rm");
        std::fs::write(&path, b"")?;

        let result = RecordManager::new().open_file(&path);
        assert!(matches!(result, Err(RecordError::StorageFault(_))));
        Ok(())
    }

    #[test]
    fn test_destroy() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.rm");
        let manager = RecordManager::new();

        manager.create_file(&path, 8)?;
        manager.destroy_file(&path)?;
        assert!(!path.exists());

        let result = manager.destroy_file(&path);
        assert!(matches!(result, Err(RecordError::FileNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_config_minimum() {
        let manager = RecordManager::with_config(RecordManagerConfig {
            buffer_pool_frames: 0,
        });
        assert_eq!(manager.config().buffer_pool_frames, MIN_BUFFER_POOL_FRAMES);
        assert_eq!(RecordManager::new().config().buffer_pool_frames, 64);
    }
}
