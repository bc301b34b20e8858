pub mod lru;
pub mod replacer;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{PageId, PageManager, PAGE_SIZE};
use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use replacer::{FrameId, Replacer};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

type PageData = Box<[u8; PAGE_SIZE]>;

struct Frame {
    /// Page latch. Guards hold it shared or exclusive for their whole life.
    data: Arc<RwLock<PageData>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }
}

/// Frame bookkeeping. Every pin, unpin and eviction decision is made while
/// holding this lock.
struct PoolState {
    replacer: Box<dyn Replacer>,
    free_frames: Vec<FrameId>,
    frame_pages: Vec<Option<PageId>>,
}

/// Page cache in front of a single [`PageManager`].
///
/// Pages are pinned through [`PageReadGuard`] / [`PageWriteGuard`] and stay
/// resident until the last guard drops. Each frame carries a reader-writer
/// latch: any number of read guards, or a single write guard, per page.
/// Latches are taken after the pool lock is released, so a thread blocked on
/// a page never stalls the rest of the pool. Holding a write guard and
/// fetching the same page again from the same thread deadlocks.
///
/// A page only becomes dirty through [`PageWriteGuard::mark_dirty`]; dirty
/// pages are written back on eviction, [`flush_page`](Self::flush_page) or
/// [`flush_all`](Self::flush_all).
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    page_table: DashMap<PageId, FrameId>,
    frames: Box<[Frame]>,
    state: Mutex<PoolState>,
    page_manager: Mutex<PageManager>,
}

impl BufferPoolManager {
    pub fn new(page_manager: PageManager, replacer: Box<dyn Replacer>, max_frames: usize) -> Self {
        let frames: Box<[Frame]> = (0..max_frames).map(|_| Frame::new()).collect();
        // Hand out low frame ids first
        let free_frames = (0..max_frames as FrameId).rev().collect();

        Self {
            inner: Arc::new(BufferPoolInner {
                page_table: DashMap::new(),
                frames,
                state: Mutex::new(PoolState {
                    replacer,
                    free_frames,
                    frame_pages: vec![None; max_frames],
                }),
                page_manager: Mutex::new(page_manager),
            }),
        }
    }

    /// Pin a page for reading, blocking while another thread holds it for
    /// writing.
    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<PageReadGuard> {
        let frame_id = self.inner.pin(page_id)?;
        let pin = Pin::new(self.inner.clone(), frame_id);
        let data = pin.frame().data.read_arc();
        Ok(PageReadGuard { data, _pin: pin })
    }

    /// Pin a page for writing. The page is not dirtied until
    /// [`PageWriteGuard::mark_dirty`] is called.
    pub fn fetch_page_write(&self, page_id: PageId) -> StorageResult<PageWriteGuard> {
        let frame_id = self.inner.pin(page_id)?;
        let pin = Pin::new(self.inner.clone(), frame_id);
        let data = pin.frame().data.write_arc();
        Ok(PageWriteGuard { data, pin })
    }

    /// Append a zero-initialised page to the file and pin it.
    pub fn new_page(&self) -> StorageResult<(PageId, PageWriteGuard)> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let frame_id = inner.acquire_frame(&mut state)?;

        let page_id = match inner.page_manager.lock().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_frames.push(frame_id);
                return Err(e);
            }
        };

        let frame = inner.frame(frame_id);
        frame.data.write().fill(0);
        frame.pin_count.store(1, Ordering::SeqCst);
        frame.is_dirty.store(true, Ordering::SeqCst);
        state.frame_pages[frame_id as usize] = Some(page_id);
        state.replacer.pin(frame_id);
        inner.page_table.insert(page_id, frame_id);
        drop(state);

        trace!("Allocated page {} in frame {}", page_id, frame_id);
        let pin = Pin::new(inner.clone(), frame_id);
        let data = pin.frame().data.write_arc();
        Ok((page_id, PageWriteGuard { data, pin }))
    }

    /// Write one page back if it is resident and dirty. Waits for a writer
    /// holding the page to finish.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let pin = {
            let mut state = self.inner.state.lock();
            match self.inner.page_table.get(&page_id).map(|e| *e.value()) {
                Some(frame_id) => {
                    self.inner.pin_frame(&mut state, frame_id);
                    Pin::new(self.inner.clone(), frame_id)
                }
                None => return Ok(()),
            }
        };
        self.inner.write_back(page_id, pin.frame_id)?;
        Ok(())
    }

    /// Write every dirty page back and sync the file.
    pub fn flush_all(&self) -> StorageResult<()> {
        // Pin every resident page so none moves while latches are awaited
        let pins: Vec<(PageId, Pin)> = {
            let mut state = self.inner.state.lock();
            let resident: Vec<(FrameId, PageId)> = state
                .frame_pages
                .iter()
                .enumerate()
                .filter_map(|(frame_id, page_id)| page_id.map(|p| (frame_id as FrameId, p)))
                .collect();
            resident
                .into_iter()
                .map(|(frame_id, page_id)| {
                    self.inner.pin_frame(&mut state, frame_id);
                    (page_id, Pin::new(self.inner.clone(), frame_id))
                })
                .collect()
        };

        let mut flushed = 0;
        for (page_id, pin) in &pins {
            if self.inner.write_back(*page_id, pin.frame_id)? {
                flushed += 1;
            }
        }
        drop(pins);
        self.inner.page_manager.lock().sync()?;

        debug!("Flushed {} dirty pages", flushed);
        Ok(())
    }

    /// Number of pages in the underlying file, cached or not.
    pub fn num_pages(&self) -> StorageResult<u32> {
        self.inner.page_manager.lock().num_pages()
    }

    pub fn path(&self) -> PathBuf {
        self.inner.page_manager.lock().path().to_path_buf()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.inner.frames.len()
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self, page_id: PageId) -> bool {
        self.inner
            .page_table
            .get(&page_id)
            .map(|e| self.inner.frame(*e.value()).is_dirty.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn is_evictable(&self, page_id: PageId) -> bool {
        let state = self.inner.state.lock();
        self.inner
            .page_table
            .get(&page_id)
            .map(|e| state.replacer.is_evictable(*e.value()))
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn pin_count(&self, page_id: PageId) -> u32 {
        self.inner
            .page_table
            .get(&page_id)
            .map(|e| self.inner.frame(*e.value()).pin_count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl BufferPoolInner {
    fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id as usize]
    }

    /// Add a pin to a resident frame.
    fn pin_frame(&self, state: &mut PoolState, frame_id: FrameId) {
        self.frame(frame_id).pin_count.fetch_add(1, Ordering::SeqCst);
        state.replacer.pin(frame_id);
    }

    fn pin(&self, page_id: PageId) -> StorageResult<FrameId> {
        let mut state = self.state.lock();

        if let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) {
            self.pin_frame(&mut state, frame_id);
            return Ok(frame_id);
        }

        // Page not resident, fault it in
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = self.frame(frame_id);
        let read = {
            let mut data = frame.data.write();
            self.page_manager.lock().read_page(page_id, &mut data[..])
        };
        if let Err(e) = read {
            state.free_frames.push(frame_id);
            return Err(e);
        }

        frame.pin_count.store(1, Ordering::SeqCst);
        frame.is_dirty.store(false, Ordering::SeqCst);
        state.frame_pages[frame_id as usize] = Some(page_id);
        state.replacer.pin(frame_id);
        self.page_table.insert(page_id, frame_id);

        trace!("Faulted in page {} to frame {}", page_id, frame_id);
        Ok(frame_id)
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if self.frame(frame_id).pin_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            state.replacer.unpin(frame_id);
            debug_assert!(state.replacer.is_evictable(frame_id));
        }
    }

    /// Take a never-used frame, or evict the replacer's victim.
    fn acquire_frame(&self, state: &mut PoolState) -> StorageResult<FrameId> {
        if let Some(frame_id) = state.free_frames.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(StorageError::BufferPoolFull {
            frames: self.frames.len(),
        })?;

        if let Some(old_page_id) = state.frame_pages[frame_id as usize] {
            if let Err(e) = self.write_back(old_page_id, frame_id) {
                state.replacer.unpin(frame_id);
                return Err(e);
            }
            self.page_table.remove(&old_page_id);
            state.frame_pages[frame_id as usize] = None;
            trace!("Evicted page {} from frame {}", old_page_id, frame_id);
        }

        Ok(frame_id)
    }

    /// Write a frame back if dirty. Returns whether anything was written.
    ///
    /// The caller keeps the frame from being reassigned, either by holding a
    /// pin or by evicting it under the pool lock.
    fn write_back(&self, page_id: PageId, frame_id: FrameId) -> StorageResult<bool> {
        let frame = self.frame(frame_id);
        let data = frame.data.read();
        if !frame.is_dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        if let Err(e) = self.page_manager.lock().write_page(page_id, &data[..]) {
            frame.is_dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(true)
    }
}

/// A pinned frame, unpinned on drop.
struct Pin {
    inner: Arc<BufferPoolInner>,
    frame_id: FrameId,
}

impl Pin {
    fn new(inner: Arc<BufferPoolInner>, frame_id: FrameId) -> Self {
        Self { inner, frame_id }
    }

    fn frame(&self) -> &Frame {
        self.inner.frame(self.frame_id)
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        self.inner.unpin(self.frame_id);
    }
}

// Field order matters in both guards: the latch is released before the pin.

pub struct PageReadGuard {
    data: ArcRwLockReadGuard<RawRwLock, PageData>,
    _pin: Pin,
}

impl Deref for PageReadGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

pub struct PageWriteGuard {
    data: ArcRwLockWriteGuard<RawRwLock, PageData>,
    pin: Pin,
}

impl PageWriteGuard {
    /// Flag the page for write-back. Pair every mutation with a call.
    pub fn mark_dirty(&self) {
        self.pin.frame().is_dirty.store(true, Ordering::SeqCst);
    }
}

impl Deref for PageWriteGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}
