use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 8192;

/// Raw page I/O against a single file.
///
/// The file is a flat array of `PAGE_SIZE` pages; page `n` starts at byte
/// `n * PAGE_SIZE`. Caching is left to the buffer pool.
pub struct PageManager {
    file: File,
    path: PathBuf,
}

impl PageManager {
    /// Create a new, empty page file. Fails if the file already exists.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::FileExists(path.to_path_buf()),
                _ => StorageError::Io(e),
            })?;

        debug!("Created page file {:?}", path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| not_found_or_io(e, path))?;

        debug!("Opened page file {:?}", path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Remove a page file from disk. The file must not be open elsewhere.
    pub fn destroy(path: &Path) -> StorageResult<()> {
        fs::remove_file(path).map_err(|e| not_found_or_io(e, path))?;
        debug!("Destroyed page file {:?}", path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StorageResult<()> {
        check_buffer_len(buf.len())?;

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();
        if offset >= file_size {
            return Err(StorageError::PageNotFound(page_id));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        check_buffer_len(data.len())?;

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();

        // Extend file if necessary
        if offset >= file_size {
            self.file.set_len(offset + PAGE_SIZE as u64)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Force written pages down to the device.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    /// Append a zero-filled page and return its id.
    pub fn allocate_page(&mut self) -> StorageResult<PageId> {
        let current_pages = self.num_pages()?;
        let new_size = (current_pages as u64 + 1) * PAGE_SIZE as u64;
        self.file.set_len(new_size)?;

        Ok(PageId(current_pages))
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}

fn check_buffer_len(len: usize) -> StorageResult<()> {
    if len != PAGE_SIZE {
        return Err(StorageError::InvalidPageBuffer {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn not_found_or_io(e: std::io::Error, path: &Path) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::FileNotFound(path.to_path_buf()),
        _ => StorageError::Io(e),
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
        let file_path = dir.path().join("test.rm");

        {
            let pm = PageManager::create(&file_path)?;
            assert_eq!(pm.num_pages()?, 0);
            assert_eq!(pm.path(), file_path.as_path());
        }

        {
            let pm = PageManager::open(&file_path)?;
            assert_eq!(pm.num_pages()?, 0);
        }

        Ok(())
    }

    #[test]
    fn test_create_existing_file_fails() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        PageManager::create(&file_path)?;

        let result = PageManager::create(&file_path);
        assert!(matches!(result, Err(StorageError::FileExists(_))));

        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        let mut pm = PageManager::create(&file_path)?;

        let mut write_buf = vec![0u8; PAGE_SIZE];
        write_buf[0] = 42;
        write_buf[PAGE_SIZE - 1] = 24;
        pm.write_page(PageId(0), &write_buf)?;

        let mut read_buf = vec![0u8; PAGE_SIZE];
        pm.read_page(PageId(0), &mut read_buf)?;

        assert_eq!(read_buf[0], 42);
        assert_eq!(read_buf[PAGE_SIZE - 1], 24);

        Ok(())
    }

    #[test]
    fn test_page_boundary() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        let mut pm = PageManager::create(&file_path)?;

        pm.write_page(PageId(0), &vec![1u8; PAGE_SIZE])?;
        pm.write_page(PageId(1), &vec![2u8; PAGE_SIZE])?;

        let mut read_buf = vec![0u8; PAGE_SIZE];
        pm.read_page(PageId(0), &mut read_buf)?;
        assert!(read_buf.iter().all(|&b| b == 1));

        pm.read_page(PageId(1), &mut read_buf)?;
        assert!(read_buf.iter().all(|&b| b == 2));

        Ok(())
    }

    #[test]
    fn test_read_nonexistent_page() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        let mut pm = PageManager::create(&file_path)?;

        let mut buf = vec![0u8; PAGE_SIZE];
        let result = pm.read_page(PageId(10), &mut buf);
        assert!(matches!(result, Err(StorageError::PageNotFound(PageId(10)))));

        Ok(())
    }

    #[test]
    fn test_invalid_buffer_size() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        let mut pm = PageManager::create(&file_path)?;

        let mut small_buf = vec![0u8; 100];
        let result = pm.read_page(PageId(0), &mut small_buf);
        assert!(matches!(
            result,
            Err(StorageError::InvalidPageBuffer { actual: 100, .. })
        ));

        let result = pm.write_page(PageId(0), &small_buf);
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn test_open_nonexistent_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("nonexistent.rm");

        let result = PageManager::open(&file_path);
        assert!(matches!(result, Err(StorageError::FileNotFound(_))));

        Ok(())
    }

    #[test]
    fn test_persistence() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");

        {
            let mut pm = PageManager::create(&file_path)?;
            pm.write_page(PageId(0), &vec![99u8; PAGE_SIZE])?;
            pm.sync()?;
        }

        {
            let mut pm = PageManager::open(&file_path)?;
            let mut buf = vec![0u8; PAGE_SIZE];
            pm.read_page(PageId(0), &mut buf)?;
            assert_eq!(buf[0], 99);
        }

        Ok(())
    }

    #[test]
    fn test_allocate_page() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        let mut pm = PageManager::create(&file_path)?;

        assert_eq!(pm.allocate_page()?, PageId(0));
        assert_eq!(pm.allocate_page()?, PageId(1));
        assert_eq!(pm.num_pages()?, 2);

        // Allocated pages read back as zeroes
        let mut buf = vec![7u8; PAGE_SIZE];
        pm.read_page(PageId(1), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_destroy() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.rm");
        drop(PageManager::create(&file_path)?);

        PageManager::destroy(&file_path)?;
        assert!(!file_path.exists());

        let result = PageManager::destroy(&file_path);
        assert!(matches!(result, Err(StorageError::FileNotFound(_))));

        Ok(())
    }
}
