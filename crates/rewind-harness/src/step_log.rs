#![forbid(unsafe_code)]

//! JSONL step log for history scenarios.
//!
//! Every operation a scenario performs is recorded as one JSON line together
//! with a hash of the document text after the step, so two runs can be diffed
//! line by line.
//!
//! ```json
//! {"event":"start","run_id":"...","case":"graph_edit_undo"}
//! {"event":"step","run_id":"...","seq":0,"op":"capture","result":"stored","past":1,"future":0,"state":"blake3:..."}
//! {"event":"complete","run_id":"...","outcome":"pass","steps":1,"total_ms":3}
//! ```
//!
//! Set `REWIND_STEP_LOG=<path>` to append the lines to a file; otherwise the
//! log is kept in memory only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use serde::{Deserialize, Serialize};
use web_time::{Instant, SystemTime, UNIX_EPOCH};

/// Prefix for state hashes in log lines.
pub const STATE_HASH_PREFIX: &str = "blake3:";

/// Environment variable naming a file to append log lines to.
pub const STEP_LOG_ENV: &str = "REWIND_STEP_LOG";

/// Hash of a document's canonical text.
#[must_use]
pub fn state_hash(text: &str) -> String {
    format!("{STATE_HASH_PREFIX}{}", blake3::hash(text.as_bytes()).to_hex())
}

/// Scenario outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEntry {
    Start {
        run_id: String,
        case: String,
    },
    Step {
        run_id: String,
        seq: u64,
        op: String,
        result: String,
        past: usize,
        future: usize,
        state: String,
    },
    Complete {
        run_id: String,
        outcome: Outcome,
        steps: u64,
        total_ms: u64,
    },
}

/// Collects [`LogEntry`] lines and optionally mirrors them to a file.
pub struct StepLog {
    writer: Option<BufWriter<File>>,
    run_id: String,
    start_time: Instant,
    seq: u64,
    entries: Vec<LogEntry>,
}

impl std::fmt::Debug for StepLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLog")
            .field("run_id", &self.run_id)
            .field("steps", &self.seq)
            .field("to_file", &self.writer.is_some())
            .finish()
    }
}

impl StepLog {
    /// In-memory log for `case`.
    #[must_use]
    pub fn new(case: &str) -> Self {
        let mut log = Self {
            writer: None,
            run_id: run_id(case),
            start_time: Instant::now(),
            seq: 0,
            entries: Vec::new(),
        };
        log.push(LogEntry::Start {
            run_id: log.run_id.clone(),
            case: case.to_string(),
        });
        log
    }

    /// Log for `case` that also appends to `path`.
    pub fn to_file(case: &str, path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut log = Self::new(case);
        log.writer = Some(BufWriter::new(file));
        // Replay the start line written before the file was attached.
        let start = log.entries.clone();
        for entry in &start {
            log.write_line(entry);
        }
        Ok(log)
    }

    /// File-backed when `REWIND_STEP_LOG` is set, in-memory otherwise.
    #[must_use]
    pub fn from_env(case: &str) -> Self {
        match std::env::var_os(STEP_LOG_ENV) {
            Some(path) => Self::to_file(case, Path::new(&path)).unwrap_or_else(|err| {
                tracing::warn!(%err, "step log file unavailable, logging in memory");
                Self::new(case)
            }),
            None => Self::new(case),
        }
    }

    /// Record one operation and the state it left behind.
    pub fn step(&mut self, op: &str, result: &str, past: usize, future: usize, text: &str) {
        let entry = LogEntry::Step {
            run_id: self.run_id.clone(),
            seq: self.seq,
            op: op.to_string(),
            result: result.to_string(),
            past,
            future,
            state: state_hash(text),
        };
        self.seq += 1;
        self.push(entry);
    }

    /// Close the log with `outcome`.
    pub fn complete(&mut self, outcome: Outcome) {
        let total_ms = u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.push(LogEntry::Complete {
            run_id: self.run_id.clone(),
            outcome,
            steps: self.seq,
            total_ms,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// State hashes of every step, in order.
    #[must_use]
    pub fn state_hashes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Step { state, .. } => Some(state.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The whole log as JSONL.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .map(|line| line + "\n")
            .collect()
    }

    fn push(&mut self, entry: LogEntry) {
        self.write_line(&entry);
        self.entries.push(entry);
    }

    fn write_line(&mut self, entry: &LogEntry) {
        if let Some(ref mut writer) = self.writer
            && let Ok(line) = serde_json::to_string(entry)
        {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

/// Parse JSONL produced by [`StepLog`].
pub fn parse_jsonl(text: &str) -> serde_json::Result<Vec<LogEntry>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

fn run_id(case: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let tag = blake3::hash(format!("{case}:{nanos}:{}", std::process::id()).as_bytes());
    tag.to_hex()[..16].to_string()
}
