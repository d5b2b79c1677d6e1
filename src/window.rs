use bitcoin::BlockHash;
use std::collections::VecDeque;

/// How many recently indexed block hashes are kept for fork detection.
pub const WINDOW_CAPACITY: usize = 120;

/// Bounded history of `(height, hash)` for the most recently indexed blocks, newest last.
///
/// The tail always describes the block at the current height checked. Nothing here is
/// persisted: after a restart the window is empty until fresh blocks are indexed.
#[derive(Clone, Debug)]
pub struct BlockWindow {
    entries: VecDeque<(u32, BlockHash)>,
    capacity: usize,
}

impl Default for BlockWindow {
    fn default() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }
}

impl BlockWindow {
    /// Window holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a freshly indexed block, evicting the oldest entry once full.
    pub fn push(&mut self, height: u32, hash: BlockHash) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((height, hash));
    }

    /// Newest entry.
    pub fn tip(&self) -> Option<(u32, BlockHash)> {
        self.entries.back().copied()
    }

    /// Drop the newest entry (one rollback step).
    pub fn pop(&mut self) -> Option<(u32, BlockHash)> {
        self.entries.pop_back()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing can be verified.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &(u32, BlockHash)> + '_ {
        self.entries.iter()
    }
}
