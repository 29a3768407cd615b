#![forbid(unsafe_code)]

//! Capture policy on top of [`SnapshotStore`].
//!
//! [`SnapshotHistory`] owns the codec, the compressor, the two stacks and
//! the reentrancy guard. Captures are deduplicated against the newest past
//! entry, so the past stack never holds two consecutive identical states.
//! Undo and redo live in [`transition`](crate::transition).
//!
//! # Invariants
//!
//! 1. After any capture or transition the newest past entry decodes to the
//!    serialized form of the live document.
//! 2. Two consecutive past entries never decode to the same text.
//! 3. `past_len() <= config.max_history_length`.
//! 4. Under [`RedoPolicy::Preserve`] only undo fills and only redo drains the
//!    future stack.

use std::fmt;

use tracing::{debug, debug_span, trace};
use web_time::Instant;

use crate::codec::DocumentCodec;
use crate::compress::{Compressor, GzipCompressor};
use crate::config::{HistoryConfig, RedoPolicy};
use crate::error::{HistoryError, HistoryResult};
use crate::guard::ReentrancyGuard;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// What a capture request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A new snapshot was appended.
    Stored {
        /// Oldest entries dropped to respect the limits.
        evicted: usize,
        /// Future entries dropped by [`RedoPolicy::ClearOnCapture`].
        redo_dropped: usize,
    },
    /// The document serialized to the same text as the current entry.
    Duplicate,
    /// A transition was running; the request was ignored.
    Suppressed,
}

impl CaptureOutcome {
    /// True when a snapshot was appended.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Snapshot-based undo/redo history for one document.
pub struct SnapshotHistory<C, Z = GzipCompressor> {
    codec: C,
    compressor: Z,
    store: SnapshotStore,
    config: HistoryConfig,
    guard: ReentrancyGuard,
    disposed: bool,
}

impl<C, Z> fmt::Debug for SnapshotHistory<C, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHistory")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("guard", &self.guard)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<C> SnapshotHistory<C, GzipCompressor> {
    /// History compressing with gzip at `config.compression_level`.
    pub fn new(codec: C, config: HistoryConfig) -> HistoryResult<Self> {
        let compressor = config.compressor();
        Self::with_compressor(codec, compressor, config)
    }
}

impl<C, Z> SnapshotHistory<C, Z> {
    /// History with an explicit compressor.
    pub fn with_compressor(codec: C, compressor: Z, config: HistoryConfig) -> HistoryResult<Self> {
        config.validate()?;
        Ok(Self {
            codec,
            compressor,
            store: SnapshotStore::new(config.max_history_length, config.max_past_bytes),
            config,
            guard: ReentrancyGuard::new(),
            disposed: false,
        })
    }

    // ====================================================================
    // Query
    // ====================================================================

    /// Undo needs the current entry plus at least one older one.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.disposed && self.store.past_len() >= 2
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.disposed && self.store.future_len() >= 1
    }

    #[must_use]
    pub fn past_len(&self) -> usize {
        self.store.past_len()
    }

    #[must_use]
    pub fn future_len(&self) -> usize {
        self.store.future_len()
    }

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    #[must_use]
    pub fn compressor(&self) -> &Z {
        &self.compressor
    }

    /// Handle to the guard shared with every wiring layer.
    #[must_use]
    pub fn guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Release every snapshot and reject further mutation.
    ///
    /// Returns `false` if the history was already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.store.reset();
        self.disposed = true;
        debug!("snapshot history disposed");
        true
    }

    pub(crate) fn ensure_live(&self) -> HistoryResult<()> {
        if self.disposed {
            Err(HistoryError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn store_mut(&mut self) -> &mut SnapshotStore {
        &mut self.store
    }
}

impl<C, Z: Compressor> SnapshotHistory<C, Z> {
    // ====================================================================
    // Capture
    // ====================================================================

    /// Record the document's current state unless it matches the newest
    /// entry. Ignored while a transition holds the guard.
    pub fn capture<D: ?Sized>(&mut self, document: &D) -> HistoryResult<CaptureOutcome>
    where
        C: DocumentCodec<D>,
    {
        self.ensure_live()?;
        if self.guard.is_held() {
            trace!("capture suppressed during transition");
            return Ok(CaptureOutcome::Suppressed);
        }
        let text = self
            .codec
            .serialize(document)
            .map_err(HistoryError::Serialize)?;
        self.capture_text(&text)
    }

    /// Record already-serialized document text.
    ///
    /// Same dedup, eviction and guard rules as [`capture`](Self::capture).
    pub fn capture_text(&mut self, text: &str) -> HistoryResult<CaptureOutcome> {
        self.ensure_live()?;
        if self.guard.is_held() {
            trace!("capture suppressed during transition");
            return Ok(CaptureOutcome::Suppressed);
        }

        let start = Instant::now();
        let _span = debug_span!("history.capture", text_len = text.len()).entered();

        if let Some(top) = self.store.peek_past()
            && top.holds(text, &self.compressor)?
        {
            trace!("capture matches current snapshot");
            return Ok(CaptureOutcome::Duplicate);
        }

        let snapshot = Snapshot::encode(text, &self.compressor)?;
        let compressed_len = snapshot.size_bytes();
        let redo_dropped = match self.config.redo_policy {
            RedoPolicy::Preserve => 0,
            RedoPolicy::ClearOnCapture => self.store.clear_future(),
        };
        let evicted = self.store.push_past(snapshot);

        debug!(
            compressed_len,
            evicted,
            redo_dropped,
            past_len = self.store.past_len(),
            future_len = self.store.future_len(),
            duration_us = start.elapsed().as_micros() as u64,
            "snapshot captured"
        );
        Ok(CaptureOutcome::Stored {
            evicted,
            redo_dropped,
        })
    }

    /// Clear both stacks and capture a fresh baseline of `document`.
    ///
    /// The document is serialized before anything is cleared, so a codec
    /// failure leaves the history untouched.
    pub fn reset<D: ?Sized>(&mut self, document: &D) -> HistoryResult<()>
    where
        C: DocumentCodec<D>,
    {
        self.ensure_live()?;
        if self.guard.is_held() {
            return Err(HistoryError::TransitionInProgress);
        }
        let text = self
            .codec
            .serialize(document)
            .map_err(HistoryError::Serialize)?;
        let baseline = Snapshot::encode(&text, &self.compressor)?;
        self.store.reset();
        self.store.push_past(baseline);
        debug!(text_len = text.len(), "history reset to baseline");
        Ok(())
    }

    // ====================================================================
    // Inspection
    // ====================================================================

    /// Decoded text of the current entry.
    pub fn current_text(&self) -> HistoryResult<Option<String>> {
        self.store
            .peek_past()
            .map(|s| s.decode(&self.compressor))
            .transpose()
    }

    /// Decoded past stack, oldest first.
    pub fn past_texts(&self) -> HistoryResult<Vec<String>> {
        self.store
            .past()
            .map(|s| s.decode(&self.compressor))
            .collect()
    }

    /// Decoded future stack, in storage order (next redo last).
    pub fn future_texts(&self) -> HistoryResult<Vec<String>> {
        self.store
            .future()
            .map(|s| s.decode(&self.compressor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Passthrough;
    use crate::error::BoxError;
    use std::cell::Cell;

    /// Document is its own text.
    struct TextCodec;

    impl DocumentCodec<String> for TextCodec {
        fn serialize(&self, document: &String) -> Result<String, BoxError> {
            Ok(document.clone())
        }

        fn restore(&self, document: &mut String, text: &str) -> Result<(), BoxError> {
            document.clear();
            document.push_str(text);
            Ok(())
        }
    }

    /// Fails to serialize when asked to.
    struct FlakyCodec {
        fail: Cell<bool>,
    }

    impl DocumentCodec<String> for FlakyCodec {
        fn serialize(&self, document: &String) -> Result<String, BoxError> {
            if self.fail.get() {
                return Err("node 7 has a dangling link".into());
            }
            Ok(document.clone())
        }

        fn restore(&self, document: &mut String, text: &str) -> Result<(), BoxError> {
            *document = text.to_string();
            Ok(())
        }
    }

    fn history(max: usize) -> SnapshotHistory<TextCodec> {
        SnapshotHistory::new(TextCodec, HistoryConfig::new(max)).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let err = SnapshotHistory::new(TextCodec, HistoryConfig::new(0)).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidConfig(_)));
    }

    #[test]
    fn distinct_captures_accumulate() {
        let mut h = history(64);
        for doc in ["a", "b", "c"] {
            let outcome = h.capture(&doc.to_string()).unwrap();
            assert!(outcome.is_stored());
        }
        assert_eq!(h.past_len(), 3);
        assert_eq!(h.current_text().unwrap().as_deref(), Some("c"));
        assert_eq!(h.past_texts().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn identical_capture_is_a_no_op() {
        let mut h = history(64);
        let doc = "same".to_string();
        h.capture(&doc).unwrap();
        assert_eq!(h.capture(&doc).unwrap(), CaptureOutcome::Duplicate);
        assert_eq!(h.past_len(), 1);
    }

    #[test]
    fn non_consecutive_repeat_is_stored() {
        let mut h = history(64);
        for doc in ["a", "b", "a"] {
            h.capture(&doc.to_string()).unwrap();
        }
        assert_eq!(h.past_texts().unwrap(), ["a", "b", "a"]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut h = history(3);
        for i in 0..3 {
            h.capture(&format!("s{i}")).unwrap();
        }
        let outcome = h.capture(&"s3".to_string()).unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Stored {
                evicted: 1,
                redo_dropped: 0
            }
        );
        assert_eq!(h.past_texts().unwrap(), ["s1", "s2", "s3"]);
    }

    #[test]
    fn capture_suppressed_while_guard_held() {
        let mut h = history(64);
        h.capture(&"a".to_string()).unwrap();
        let guard = h.guard().clone();
        let token = guard.try_enter().unwrap();
        assert_eq!(
            h.capture(&"b".to_string()).unwrap(),
            CaptureOutcome::Suppressed
        );
        assert_eq!(h.capture_text("c").unwrap(), CaptureOutcome::Suppressed);
        assert_eq!(h.past_len(), 1);
        drop(token);
        assert!(h.capture(&"b".to_string()).unwrap().is_stored());
    }

    #[test]
    fn serialize_failure_propagates_without_mutation() {
        let codec = FlakyCodec {
            fail: Cell::new(false),
        };
        let mut h = SnapshotHistory::with_compressor(codec, Passthrough, HistoryConfig::default())
            .unwrap();
        h.capture(&"ok".to_string()).unwrap();
        h.codec().fail.set(true);
        let err = h.capture(&"broken".to_string()).unwrap_err();
        assert!(matches!(err, HistoryError::Serialize(_)));
        assert_eq!(h.past_len(), 1);
    }

    #[test]
    fn reset_leaves_single_baseline() {
        let mut h = history(64);
        for doc in ["a", "b", "c"] {
            h.capture(&doc.to_string()).unwrap();
        }
        let mut doc = "c".to_string();
        h.undo(&mut doc).unwrap();
        assert_eq!(h.future_len(), 1);

        let loaded = "fresh file".to_string();
        h.reset(&loaded).unwrap();
        assert_eq!(h.past_len(), 1);
        assert_eq!(h.future_len(), 0);
        assert_eq!(h.current_text().unwrap().as_deref(), Some("fresh file"));
    }

    #[test]
    fn reset_failure_keeps_existing_history() {
        let codec = FlakyCodec {
            fail: Cell::new(false),
        };
        let mut h = SnapshotHistory::with_compressor(codec, Passthrough, HistoryConfig::default())
            .unwrap();
        h.capture(&"a".to_string()).unwrap();
        h.capture(&"b".to_string()).unwrap();
        h.codec().fail.set(true);
        assert!(h.reset(&"c".to_string()).is_err());
        assert_eq!(h.past_len(), 2);
    }

    #[test]
    fn clear_on_capture_drops_redo() {
        let config = HistoryConfig::default().with_redo_policy(RedoPolicy::ClearOnCapture);
        let mut h = SnapshotHistory::new(TextCodec, config).unwrap();
        let mut doc = String::new();
        for s in ["a", "b", "c"] {
            doc.clear();
            doc.push_str(s);
            h.capture(&doc).unwrap();
        }
        h.undo(&mut doc).unwrap();
        assert_eq!(h.future_len(), 1);

        // A duplicate leaves the redo stack alone.
        assert_eq!(h.capture(&doc).unwrap(), CaptureOutcome::Duplicate);
        assert_eq!(h.future_len(), 1);

        doc.push('!');
        assert_eq!(
            h.capture(&doc).unwrap(),
            CaptureOutcome::Stored {
                evicted: 0,
                redo_dropped: 1
            }
        );
        assert!(!h.can_redo());
    }

    #[test]
    fn preserve_keeps_redo_across_captures() {
        let mut h = history(64);
        let mut doc = String::new();
        for s in ["a", "b", "c"] {
            doc.clear();
            doc.push_str(s);
            h.capture(&doc).unwrap();
        }
        h.undo(&mut doc).unwrap();
        doc.push('!');
        h.capture(&doc).unwrap();
        assert_eq!(h.future_len(), 1);
        assert_eq!(h.past_texts().unwrap(), ["a", "b", "b!"]);
    }

    #[test]
    fn disposed_history_rejects_mutation() {
        let mut h = history(64);
        h.capture(&"a".to_string()).unwrap();
        assert!(h.dispose());
        assert!(!h.dispose());
        assert!(h.is_disposed());
        assert_eq!(h.past_len(), 0);
        assert!(matches!(
            h.capture(&"b".to_string()),
            Err(HistoryError::Disposed)
        ));
        assert!(matches!(
            h.reset(&"b".to_string()),
            Err(HistoryError::Disposed)
        ));
        let mut doc = "b".to_string();
        assert!(matches!(h.undo(&mut doc), Err(HistoryError::Disposed)));
        assert!(!h.can_undo());
    }

    #[test]
    fn gzip_history_round_trips_text() {
        let mut h = history(8);
        let big = "{\"node\":42}".repeat(200);
        h.capture(&big).unwrap();
        assert!(h.store().past_bytes() < big.len());
        assert_eq!(h.current_text().unwrap().as_deref(), Some(big.as_str()));
    }
}
