#![forbid(unsafe_code)]

//! Test fixtures for the `rewind` history crate.
//!
//! # Modules
//!
//! - [`fixture`] - a serde node graph and an editor that announces its edits
//! - [`faults`] - codec/compressor wrappers that fail on demand or echo
//!   change events from inside a restore
//! - [`notices`] - records `SelectionCleared` / `ResetRequired` delivery
//! - [`step_log`] - JSONL step log with blake3 state hashes

pub mod faults;
pub mod fixture;
pub mod notices;
pub mod step_log;

pub use faults::{EchoingCodec, FaultSwitch, FaultyCodec, FaultyCompressor};
pub use fixture::{Graph, GraphEditor, Link, Node};
pub use notices::{Notice, NoticeRecorder};
pub use step_log::{LogEntry, Outcome, StepLog, parse_jsonl, state_hash};
