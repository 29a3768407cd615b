#![forbid(unsafe_code)]

//! Bounded two-stack storage for compressed snapshots.
//!
//! # Architecture
//!
//! ```text
//! push_past(s2)
//! ┌──────────────────────────────────────────┐
//! │ Past:    [s0, s1, s2]   (s2 = current)   │
//! │ Future:  []                              │
//! └──────────────────────────────────────────┘
//!
//! pop_past -> push_future, twice
//! ┌──────────────────────────────────────────┐
//! │ Past:    [s0]           (s0 = current)   │
//! │ Future:  [s2, s1]       (s1 redone next) │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The store only enforces capacity. Which entry is "current" and when the
//! future stack may be touched is decided by
//! [`SnapshotHistory`](crate::SnapshotHistory).
//!
//! # Invariants
//!
//! 1. `past.len() <= max_len` after every `push_past`.
//! 2. `past_bytes` equals the sum of `size_bytes()` over the past stack.
//! 3. The byte budget never evicts the newest past entry.

use std::collections::VecDeque;
use std::fmt;

use crate::error::{HistoryError, HistoryResult, StackKind};
use crate::snapshot::Snapshot;

/// Past and future snapshot stacks with eviction.
pub struct SnapshotStore {
    /// Oldest first; the back is the current state.
    past: VecDeque<Snapshot>,
    /// Most recently undone at the back.
    future: Vec<Snapshot>,
    max_len: usize,
    /// 0 = unlimited.
    max_past_bytes: usize,
    past_bytes: usize,
    future_bytes: usize,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("past_len", &self.past.len())
            .field("future_len", &self.future.len())
            .field("max_len", &self.max_len)
            .field("past_bytes", &self.past_bytes)
            .field("future_bytes", &self.future_bytes)
            .finish()
    }
}

impl SnapshotStore {
    /// Empty store bounded to `max_len` past entries and `max_past_bytes`
    /// compressed bytes (0 = unlimited).
    #[must_use]
    pub fn new(max_len: usize, max_past_bytes: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            max_len,
            max_past_bytes,
            past_bytes: 0,
            future_bytes: 0,
        }
    }

    // ====================================================================
    // Past stack
    // ====================================================================

    /// Append to the past stack, then evict from the front until both
    /// limits hold. Returns how many entries were evicted.
    pub fn push_past(&mut self, snapshot: Snapshot) -> usize {
        self.push_past_untrimmed(snapshot);
        self.enforce_limits()
    }

    /// Append to the past stack without evicting. The stack may sit one
    /// entry over its limits until [`trim`](Self::trim) runs.
    pub(crate) fn push_past_untrimmed(&mut self, snapshot: Snapshot) {
        self.past_bytes += snapshot.size_bytes();
        self.past.push_back(snapshot);
    }

    /// Evict from the front until both limits hold. Returns how many entries
    /// were evicted.
    pub(crate) fn trim(&mut self) -> usize {
        self.enforce_limits()
    }

    /// Remove and return the current (newest) past entry.
    pub fn pop_past(&mut self) -> HistoryResult<Snapshot> {
        let snapshot = self
            .past
            .pop_back()
            .ok_or(HistoryError::EmptyStack(StackKind::Past))?;
        self.past_bytes -= snapshot.size_bytes();
        Ok(snapshot)
    }

    /// The current (newest) past entry.
    #[must_use]
    pub fn peek_past(&self) -> Option<&Snapshot> {
        self.past.back()
    }

    /// Past entry `depth` steps behind the newest (0 = newest).
    #[must_use]
    pub fn peek_past_at(&self, depth: usize) -> Option<&Snapshot> {
        let idx = self.past.len().checked_sub(depth + 1)?;
        self.past.get(idx)
    }

    /// Past entries, oldest first.
    pub fn past(&self) -> impl ExactSizeIterator<Item = &Snapshot> + '_ {
        self.past.iter()
    }

    // ====================================================================
    // Future stack
    // ====================================================================

    /// Append to the future stack.
    pub fn push_future(&mut self, snapshot: Snapshot) {
        self.future_bytes += snapshot.size_bytes();
        self.future.push(snapshot);
    }

    /// Remove and return the most recently undone entry.
    pub fn pop_future(&mut self) -> HistoryResult<Snapshot> {
        let snapshot = self
            .future
            .pop()
            .ok_or(HistoryError::EmptyStack(StackKind::Future))?;
        self.future_bytes -= snapshot.size_bytes();
        Ok(snapshot)
    }

    /// The most recently undone entry.
    #[must_use]
    pub fn peek_future(&self) -> Option<&Snapshot> {
        self.future.last()
    }

    /// Future entries, oldest undo first.
    pub fn future(&self) -> impl ExactSizeIterator<Item = &Snapshot> + '_ {
        self.future.iter()
    }

    /// Drop every future entry.
    pub fn clear_future(&mut self) -> usize {
        let dropped = self.future.len();
        self.future.clear();
        self.future_bytes = 0;
        dropped
    }

    // ====================================================================
    // Query
    // ====================================================================

    #[must_use]
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.past.is_empty() && self.future.is_empty()
    }

    /// Compressed bytes held by the past stack.
    #[must_use]
    pub fn past_bytes(&self) -> usize {
        self.past_bytes
    }

    /// Compressed bytes held by both stacks.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.past_bytes + self.future_bytes
    }

    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    // ====================================================================
    // Maintenance
    // ====================================================================

    /// Clear both stacks unconditionally.
    pub fn reset(&mut self) {
        self.past.clear();
        self.future.clear();
        self.past_bytes = 0;
        self.future_bytes = 0;
    }

    fn enforce_limits(&mut self) -> usize {
        let mut evicted = 0;
        while self.past.len() > self.max_len
            || (self.max_past_bytes > 0
                && self.past_bytes > self.max_past_bytes
                && self.past.len() > 1)
        {
            let Some(oldest) = self.past.pop_front() else {
                break;
            };
            self.past_bytes -= oldest.size_bytes();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                past_len = self.past.len(),
                past_bytes = self.past_bytes,
                "evicted oldest snapshots"
            );
        }
        evicted
    }
}
