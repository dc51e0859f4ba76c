//! Active set management for streaming overlap queries.
//!
//! The ActiveSet maintains the filter features that could still overlap the
//! current query position, with automatic compaction to bound memory.

use crate::feature::Feature;

/// Compaction threshold - trigger when head_idx exceeds this value.
const COMPACTION_THRESHOLD: usize = 4096;

/// Active set with automatic compaction.
///
/// Uses Vec + head_idx pattern for better cache locality than VecDeque.
/// Elements before head_idx are logically removed but not deallocated
/// until compaction is triggered.
///
/// # Memory Complexity
///
/// O(k) where k = max number of overlapping features at any position.
/// Periodic compaction ensures memory doesn't grow unbounded.
#[derive(Debug)]
pub struct ActiveSet<T> {
    /// Storage for active elements.
    data: Vec<T>,
    /// Index of the first logically active element.
    head_idx: usize,
    /// Maximum observed active size (for statistics).
    max_active: usize,
    /// Storage length that triggers the next full compaction.
    compact_at: usize,
}

impl<T> Default for ActiveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActiveSet<T> {
    /// Create a new empty active set.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new active set with specified initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head_idx: 0,
            max_active: 0,
            compact_at: COMPACTION_THRESHOLD,
        }
    }

    /// Add an element to the active set.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.data.push(value);
        self.max_active = self.max_active.max(self.len());
    }

    /// Get the number of logically active elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head_idx
    }

    /// Check if the active set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head_idx >= self.data.len()
    }

    /// Get a slice of all active elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.head_idx..]
    }

    /// Advance head while condition is true for the front element.
    ///
    /// Returns the number of elements removed.
    #[inline]
    pub fn advance_while<F>(&mut self, mut condition: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let start_idx = self.head_idx;
        while self.head_idx < self.data.len() && condition(&self.data[self.head_idx]) {
            self.head_idx += 1;
        }
        self.head_idx - start_idx
    }

    /// Compact the internal storage if needed.
    ///
    /// Logically removed elements are dropped, and so is any element for
    /// which `keep` returns false.
    pub fn compact_if_needed<F>(&mut self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        if self.head_idx > COMPACTION_THRESHOLD || self.data.len() > self.compact_at {
            self.data.drain(0..self.head_idx);
            self.head_idx = 0;
            self.data.retain(keep);
            self.compact_at = (self.data.len() * 2).max(COMPACTION_THRESHOLD);
        }
    }

    /// Clear all elements and reset state.
    pub fn clear(&mut self) {
        self.data.clear();
        self.head_idx = 0;
        self.compact_at = COMPACTION_THRESHOLD;
    }

    /// Get the maximum active size observed (for statistics).
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Iterator over active elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data[self.head_idx..].iter()
    }

    /// Get reference to first active element.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.data.get(self.head_idx)
    }
}

/// Active set specialized for features with expiration by end position.
///
/// Features enter in start order, so only a prefix can be dropped cheaply;
/// expired features further in are skipped by queries and reclaimed at
/// compaction.
impl ActiveSet<Feature> {
    /// Remove expired features (those ending at or before the given position).
    ///
    /// Returns the number of features removed from the front.
    #[inline]
    pub fn expire_before(&mut self, position: i64) -> usize {
        let count = self.advance_while(|f| f.end <= position);
        self.compact_if_needed(|f| f.end > position);
        count
    }

    /// Iterate over features that overlap the range [start, end).
    pub fn iter_overlapping(&self, start: i64, end: i64) -> impl Iterator<Item = &Feature> {
        self.iter().filter(move |f| f.end > start && f.start < end)
    }
}
