#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rewind::{
    CaptureOutcome, DocumentCodec, HistoryConfig, JsonCodec, RedoPolicy, SnapshotHistory,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Push(u8),
    Pop,
    Capture,
    Undo,
    Redo,
    Reset,
}

#[derive(Debug, Arbitrary)]
struct Input {
    max_len: u8,
    budget: u16,
    clear_on_capture: bool,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let max_len = usize::from(input.max_len % 16) + 1;
    let policy = if input.clear_on_capture {
        RedoPolicy::ClearOnCapture
    } else {
        RedoPolicy::Preserve
    };
    let config = HistoryConfig::new(max_len)
        .with_max_past_bytes(usize::from(input.budget))
        .with_redo_policy(policy);
    let mut history = SnapshotHistory::new(JsonCodec, config).expect("valid config");
    let mut doc: Vec<u8> = Vec::new();
    history.capture(&doc).expect("baseline");

    for op in input.ops.into_iter().take(256) {
        match op {
            Op::Push(b) => doc.push(b),
            Op::Pop => {
                doc.pop();
            }
            Op::Capture => {
                let before = history.past_len();
                let outcome = history.capture(&doc).expect("capture");
                if outcome == CaptureOutcome::Duplicate {
                    assert_eq!(history.past_len(), before, "duplicate grew history");
                }
            }
            Op::Undo => {
                let before = history.past_len();
                let moved = history.undo(&mut doc).expect("undo");
                assert_eq!(moved, before >= 2, "undo availability");
            }
            Op::Redo => {
                let had_future = history.future_len() > 0;
                let moved = history.redo(&mut doc).expect("redo");
                assert_eq!(moved, had_future, "redo availability");
            }
            Op::Reset => {
                history.reset(&doc).expect("reset");
                assert_eq!(history.past_len(), 1);
                assert_eq!(history.future_len(), 0);
            }
        }

        // Bounded, never empty, and the current entry always decodes.
        assert!(history.past_len() >= 1, "past stack emptied");
        assert!(history.past_len() <= max_len, "past stack over limit");
        let current = history.current_text().expect("decode").expect("current");
        let mut restored: Vec<u8> = Vec::new();
        JsonCodec.restore(&mut restored, &current).expect("restore current");
    }
});
