use std::fmt::Debug;

/// Index of a frame within a buffer pool.
pub type FrameId = u32;

/// Eviction policy over the frames of a buffer pool.
///
/// The pool reports a frame as unpinned when its pin count drops to zero and
/// as pinned when it is handed out again. Only unpinned frames may be chosen.
pub trait Replacer: Send + Sync + Debug {
    /// Choose and forget a victim, or `None` when every frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    fn pin(&mut self, frame_id: FrameId);

    fn unpin(&mut self, frame_id: FrameId);

    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Number of eviction candidates.
    fn size(&self) -> usize;
}
