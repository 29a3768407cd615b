#![forbid(unsafe_code)]

//! Undo and redo.
//!
//! A transition runs entirely under the reentrancy guard:
//!
//! ```text
//! guard ─► decode target ─► move top between stacks ─► selection cleared
//!       ─► codec.restore(document) ─► reset required ─► release guard
//! ```
//!
//! Undo restores the entry *below* the one it moves, because the newest past
//! entry is always the current state. Redo restores the entry it moves.
//!
//! The target is decoded before any stack is touched, and the move is
//! reverted if the "selection cleared" notification or the restore fails.
//! A redo that overfills the past stack evicts only once the restore has
//! succeeded. A failed transition therefore leaves both stacks and (given an
//! atomic codec) the document exactly as they were.

use std::fmt;

use tracing::{debug, info_span, trace};
use web_time::Instant;

use crate::codec::DocumentCodec;
use crate::compress::Compressor;
use crate::error::{HistoryError, HistoryResult};
use crate::history::SnapshotHistory;

/// Which way a transition moves through history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives the notifications a transition publishes.
///
/// `selection_cleared` fires before the document is touched so observers can
/// drop references to soon-stale nodes; `reset_required` fires after the
/// restore so views can rebuild. Transitions always pass `full = true`.
pub trait TransitionObserver {
    fn selection_cleared(&mut self) -> HistoryResult<()> {
        Ok(())
    }

    fn reset_required(&mut self, _full: bool) -> HistoryResult<()> {
        Ok(())
    }
}

/// No observers.
impl TransitionObserver for () {}

impl<C, Z: Compressor> SnapshotHistory<C, Z> {
    /// Step back one state. Returns `Ok(false)` when fewer than two past
    /// entries exist.
    pub fn undo<D: ?Sized>(&mut self, document: &mut D) -> HistoryResult<bool>
    where
        C: DocumentCodec<D>,
    {
        self.transition(Direction::Undo, document, &mut ())
    }

    /// Re-apply the most recently undone state. Returns `Ok(false)` when the
    /// future stack is empty.
    pub fn redo<D: ?Sized>(&mut self, document: &mut D) -> HistoryResult<bool>
    where
        C: DocumentCodec<D>,
    {
        self.transition(Direction::Redo, document, &mut ())
    }

    /// [`undo`](Self::undo), publishing to `observer`.
    pub fn undo_with<D, O>(&mut self, document: &mut D, observer: &mut O) -> HistoryResult<bool>
    where
        D: ?Sized,
        O: TransitionObserver + ?Sized,
        C: DocumentCodec<D>,
    {
        self.transition(Direction::Undo, document, observer)
    }

    /// [`redo`](Self::redo), publishing to `observer`.
    pub fn redo_with<D, O>(&mut self, document: &mut D, observer: &mut O) -> HistoryResult<bool>
    where
        D: ?Sized,
        O: TransitionObserver + ?Sized,
        C: DocumentCodec<D>,
    {
        self.transition(Direction::Redo, document, observer)
    }

    fn transition<D, O>(
        &mut self,
        direction: Direction,
        document: &mut D,
        observer: &mut O,
    ) -> HistoryResult<bool>
    where
        D: ?Sized,
        O: TransitionObserver + ?Sized,
        C: DocumentCodec<D>,
    {
        self.ensure_live()?;
        let guard = self.guard().clone();
        let Some(_token) = guard.try_enter() else {
            return Err(HistoryError::TransitionInProgress);
        };

        let start = Instant::now();
        let _span = info_span!("history.transition", direction = direction.as_str()).entered();

        let Some(text) = self.stage(direction)? else {
            trace!("nothing to {direction}");
            return Ok(false);
        };

        let applied = observer
            .selection_cleared()
            .and_then(|()| self.restore_into(document, &text));
        if let Err(err) = applied {
            self.unstage(direction);
            return Err(err);
        }
        self.commit(direction);
        observer.reset_required(true)?;

        debug!(
            past_len = self.past_len(),
            future_len = self.future_len(),
            duration_us = start.elapsed().as_micros() as u64,
            "transition applied"
        );
        Ok(true)
    }

    /// Decode the target of `direction` and move the stacks accordingly.
    ///
    /// Returns `None` at a history boundary. The caller must hold the guard.
    pub(crate) fn stage(&mut self, direction: Direction) -> HistoryResult<Option<String>> {
        let target = match direction {
            Direction::Undo => self.store().peek_past_at(1),
            Direction::Redo => self.store().peek_future(),
        };
        let Some(target) = target else {
            return Ok(None);
        };
        let text = target.decode(self.compressor())?;

        let store = self.store_mut();
        match direction {
            Direction::Undo => {
                let current = store.pop_past()?;
                store.push_future(current);
            }
            Direction::Redo => {
                let next = store.pop_future()?;
                // Eviction waits for `commit`, so a rollback loses nothing.
                store.push_past_untrimmed(next);
            }
        }
        Ok(Some(text))
    }

    /// Finish a [`stage`](Self::stage) whose restore succeeded: apply the
    /// past-stack limits the staged move may have exceeded.
    pub(crate) fn commit(&mut self, direction: Direction) {
        let evicted = self.store_mut().trim();
        if evicted > 0 {
            debug!(direction = direction.as_str(), evicted, "transition committed");
        }
    }

    /// Reverse a [`stage`](Self::stage) whose restore did not happen.
    pub(crate) fn unstage(&mut self, direction: Direction) {
        let store = self.store_mut();
        match direction {
            Direction::Undo => {
                if let Ok(snapshot) = store.pop_future() {
                    store.push_past_untrimmed(snapshot);
                }
            }
            Direction::Redo => {
                if let Ok(snapshot) = store.pop_past() {
                    store.push_future(snapshot);
                }
            }
        }
        debug!(direction = direction.as_str(), "transition rolled back");
    }

    /// Apply decoded snapshot text to the document.
    pub(crate) fn restore_into<D: ?Sized>(&self, document: &mut D, text: &str) -> HistoryResult<()>
    where
        C: DocumentCodec<D>,
    {
        self.codec()
            .restore(document, text)
            .map_err(HistoryError::Restore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Passthrough;
    use crate::config::HistoryConfig;
    use crate::error::BoxError;
    use std::cell::Cell;
    use std::io;

    struct TextCodec {
        fail_restore: Cell<bool>,
    }

    impl TextCodec {
        fn new() -> Self {
            Self {
                fail_restore: Cell::new(false),
            }
        }
    }

    impl DocumentCodec<String> for TextCodec {
        fn serialize(&self, document: &String) -> Result<String, BoxError> {
            Ok(document.clone())
        }

        fn restore(&self, document: &mut String, text: &str) -> Result<(), BoxError> {
            if self.fail_restore.get() {
                return Err("schema mismatch".into());
            }
            *document = text.to_string();
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        fail_selection: bool,
    }

    impl TransitionObserver for Recorder {
        fn selection_cleared(&mut self) -> HistoryResult<()> {
            if self.fail_selection {
                return Err(HistoryError::listener("selection-cleared", "panel closed"));
            }
            self.log.push("selection-cleared".into());
            Ok(())
        }

        fn reset_required(&mut self, full: bool) -> HistoryResult<()> {
            self.log.push(format!("reset-required:{full}"));
            Ok(())
        }
    }

    /// Passthrough that can be told to corrupt reads.
    struct Fragile {
        broken: Cell<bool>,
    }

    impl Compressor for Fragile {
        fn compress(&self, text: &str) -> io::Result<Vec<u8>> {
            Passthrough.compress(text)
        }

        fn decompress(&self, bytes: &[u8]) -> io::Result<String> {
            if self.broken.get() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated"));
            }
            Passthrough.decompress(bytes)
        }
    }

    fn abc() -> (SnapshotHistory<TextCodec>, String) {
        let mut h = SnapshotHistory::new(TextCodec::new(), HistoryConfig::default()).unwrap();
        let mut doc = String::new();
        for s in ["A", "B", "C"] {
            doc.clear();
            doc.push_str(s);
            h.capture(&doc).unwrap();
        }
        (h, doc)
    }

    #[test]
    fn undo_undo_redo_scenario() {
        let (mut h, mut doc) = abc();
        assert_eq!(h.past_texts().unwrap(), ["A", "B", "C"]);

        assert!(h.undo(&mut doc).unwrap());
        assert_eq!(doc, "B");
        assert_eq!(h.past_texts().unwrap(), ["A", "B"]);
        assert_eq!(h.future_texts().unwrap(), ["C"]);

        assert!(h.undo(&mut doc).unwrap());
        assert_eq!(doc, "A");
        assert_eq!(h.past_texts().unwrap(), ["A"]);
        assert_eq!(h.future_texts().unwrap(), ["C", "B"]);

        assert!(h.redo(&mut doc).unwrap());
        assert_eq!(doc, "B");
        assert_eq!(h.past_texts().unwrap(), ["A", "B"]);
        assert_eq!(h.future_texts().unwrap(), ["C"]);
    }

    #[test]
    fn undo_then_redo_is_identity() {
        let (mut h, mut doc) = abc();
        let before = doc.clone();
        h.undo(&mut doc).unwrap();
        h.redo(&mut doc).unwrap();
        assert_eq!(doc, before);
        assert_eq!(h.current_text().unwrap().as_deref(), Some(before.as_str()));
    }

    #[test]
    fn undo_at_baseline_is_a_no_op() {
        let mut h = SnapshotHistory::new(TextCodec::new(), HistoryConfig::default()).unwrap();
        let mut doc = "only".to_string();
        assert!(!h.undo(&mut doc).unwrap());
        h.capture(&doc).unwrap();
        assert!(!h.undo(&mut doc).unwrap());
        assert_eq!(doc, "only");
        assert_eq!(h.past_len(), 1);
        assert_eq!(h.future_len(), 0);
    }

    #[test]
    fn redo_with_empty_future_is_a_no_op() {
        let (mut h, mut doc) = abc();
        let mut rec = Recorder::default();
        assert!(!h.redo_with(&mut doc, &mut rec).unwrap());
        assert_eq!(doc, "C");
        assert_eq!(h.past_len(), 3);
        assert!(rec.log.is_empty());
    }

    #[test]
    fn notifications_bracket_the_restore() {
        let (mut h, mut doc) = abc();
        let mut rec = Recorder::default();
        h.undo_with(&mut doc, &mut rec).unwrap();
        h.redo_with(&mut doc, &mut rec).unwrap();
        assert_eq!(
            rec.log,
            [
                "selection-cleared",
                "reset-required:true",
                "selection-cleared",
                "reset-required:true"
            ]
        );
    }

    #[test]
    fn guard_is_released_after_transition() {
        let (mut h, mut doc) = abc();
        h.undo(&mut doc).unwrap();
        assert!(!h.guard().is_held());
        assert!(h.capture(&"D".to_string()).unwrap().is_stored());
    }

    #[test]
    fn held_guard_rejects_transition() {
        let (mut h, mut doc) = abc();
        let guard = h.guard().clone();
        let _token = guard.try_enter().unwrap();
        assert!(matches!(
            h.undo(&mut doc),
            Err(HistoryError::TransitionInProgress)
        ));
        assert_eq!(h.past_len(), 3);
    }

    #[test]
    fn failed_restore_rolls_back_stacks() {
        let (mut h, mut doc) = abc();
        h.codec().fail_restore.set(true);
        let err = h.undo(&mut doc).unwrap_err();
        assert!(matches!(err, HistoryError::Restore(_)));
        assert_eq!(doc, "C");
        assert_eq!(h.past_texts().unwrap(), ["A", "B", "C"]);
        assert_eq!(h.future_len(), 0);
        assert!(!h.guard().is_held());

        h.codec().fail_restore.set(false);
        h.undo(&mut doc).unwrap();
        h.codec().fail_restore.set(true);
        assert!(h.redo(&mut doc).is_err());
        assert_eq!(doc, "B");
        assert_eq!(h.past_texts().unwrap(), ["A", "B"]);
        assert_eq!(h.future_texts().unwrap(), ["C"]);
    }

    #[test]
    fn failing_selection_listener_leaves_document() {
        let (mut h, mut doc) = abc();
        let mut rec = Recorder {
            fail_selection: true,
            ..Recorder::default()
        };
        let err = h.undo_with(&mut doc, &mut rec).unwrap_err();
        assert!(matches!(err, HistoryError::Listener { .. }));
        assert_eq!(doc, "C");
        assert_eq!(h.past_len(), 3);
        assert_eq!(h.future_len(), 0);
    }

    #[test]
    fn decompress_failure_touches_nothing() {
        let fragile = Fragile {
            broken: Cell::new(false),
        };
        let mut h =
            SnapshotHistory::with_compressor(TextCodec::new(), fragile, HistoryConfig::default())
                .unwrap();
        let mut doc = String::new();
        for s in ["A", "B"] {
            doc.clear();
            doc.push_str(s);
            h.capture(&doc).unwrap();
        }
        h.compressor().broken.set(true);
        let err = h.undo(&mut doc).unwrap_err();
        assert!(matches!(err, HistoryError::Decompress(_)));
        assert_eq!(doc, "B");
        assert_eq!(h.past_len(), 2);
        assert_eq!(h.future_len(), 0);
    }

    /// Past = [A, C] at capacity 2, future = [B].
    fn full_past_with_redo() -> (SnapshotHistory<TextCodec>, String) {
        let mut h = SnapshotHistory::new(TextCodec::new(), HistoryConfig::new(2)).unwrap();
        let mut doc = String::new();
        for s in ["A", "B"] {
            doc.clear();
            doc.push_str(s);
            h.capture(&doc).unwrap();
        }
        h.undo(&mut doc).unwrap();
        doc.clear();
        doc.push_str("C");
        h.capture(&doc).unwrap();
        assert_eq!(h.past_texts().unwrap(), ["A", "C"]);
        assert_eq!(h.future_texts().unwrap(), ["B"]);
        (h, doc)
    }

    #[test]
    fn failed_redo_at_capacity_keeps_oldest_entry() {
        let (mut h, mut doc) = full_past_with_redo();
        h.codec().fail_restore.set(true);
        assert!(matches!(h.redo(&mut doc), Err(HistoryError::Restore(_))));
        assert_eq!(doc, "C");
        assert_eq!(h.past_texts().unwrap(), ["A", "C"]);
        assert_eq!(h.future_texts().unwrap(), ["B"]);
        let held: usize = h.store().past().map(|s| s.size_bytes()).sum();
        assert_eq!(h.store().past_bytes(), held);
    }

    #[test]
    fn failed_selection_listener_on_redo_at_capacity_keeps_oldest_entry() {
        let (mut h, mut doc) = full_past_with_redo();
        let mut rec = Recorder {
            fail_selection: true,
            ..Recorder::default()
        };
        assert!(h.redo_with(&mut doc, &mut rec).is_err());
        assert_eq!(h.past_texts().unwrap(), ["A", "C"]);
        assert_eq!(h.future_texts().unwrap(), ["B"]);
    }

    #[test]
    fn successful_redo_at_capacity_evicts_after_restore() {
        let (mut h, mut doc) = full_past_with_redo();
        assert!(h.redo(&mut doc).unwrap());
        assert_eq!(doc, "B");
        assert_eq!(h.past_texts().unwrap(), ["C", "B"]);
        assert_eq!(h.future_len(), 0);
        let held: usize = h.store().past().map(|s| s.size_bytes()).sum();
        assert_eq!(h.store().past_bytes(), held);
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Undo.to_string(), "undo");
        assert_eq!(Direction::Redo.as_str(), "redo");
    }
}
