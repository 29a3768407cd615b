#![forbid(unsafe_code)]

//! Configuration for [`SnapshotHistory`](crate::SnapshotHistory).
//!
//! The only knob most callers touch is `max_history_length`. The remaining
//! fields exist for hosts with large documents or stricter redo semantics.
//!
//! # Loading
//!
//! With the `config-file` feature the config can be read from TOML or JSON.
//! Missing keys fall back to their defaults:
//!
//! ```toml
//! # rewind.toml
//! max_history_length = 128
//! max_past_bytes = 8388608
//! redo_policy = "clear-on-capture"
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("rewind.toml")?;
//! ```

#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// Default number of retained past snapshots.
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 64;

/// What a fresh capture does to the redo (future) stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum RedoPolicy {
    /// Captures never touch the future stack; only undo fills it and only
    /// redo drains it.
    #[default]
    Preserve,
    /// A capture that stores a new snapshot discards the future stack, so
    /// redo can never jump into a state that diverged from the edit history.
    ClearOnCapture,
}

/// Tunables for the snapshot history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct HistoryConfig {
    /// Maximum number of snapshots on the past stack, current state included.
    pub max_history_length: usize,
    /// Byte budget for the compressed past stack (0 = unlimited). The newest
    /// snapshot is always kept even when it alone exceeds the budget.
    pub max_past_bytes: usize,
    /// Future-stack behaviour on capture.
    pub redo_policy: RedoPolicy,
    /// Gzip level (0-9) used by [`HistoryConfig::compressor`].
    pub compression_level: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            max_past_bytes: 0,
            redo_policy: RedoPolicy::Preserve,
            compression_level: 1,
        }
    }
}

impl HistoryConfig {
    /// Default configuration with a custom length bound.
    #[must_use]
    pub fn new(max_history_length: usize) -> Self {
        Self {
            max_history_length,
            ..Self::default()
        }
    }

    /// Set the compressed byte budget for the past stack.
    #[must_use]
    pub fn with_max_past_bytes(mut self, max_past_bytes: usize) -> Self {
        self.max_past_bytes = max_past_bytes;
        self
    }

    /// Set the redo policy.
    #[must_use]
    pub fn with_redo_policy(mut self, redo_policy: RedoPolicy) -> Self {
        self.redo_policy = redo_policy;
        self
    }

    /// Set the gzip level.
    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Unbounded length and bytes (for testing).
    ///
    /// The length is capped at `i64::MAX`, the largest integer TOML can
    /// hold, so the config still round-trips through a file.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_history_length: usize::try_from(i64::MAX).unwrap_or(usize::MAX),
            ..Self::default()
        }
    }

    /// Check that every field is in range.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.max_history_length == 0 {
            return Err(HistoryError::InvalidConfig(
                "max_history_length must be at least 1".to_string(),
            ));
        }
        if self.compression_level > 9 {
            return Err(HistoryError::InvalidConfig(format!(
                "compression_level {} is outside 0..=9",
                self.compression_level
            )));
        }
        Ok(())
    }

    /// Gzip compressor at the configured level.
    #[must_use]
    pub fn compressor(&self) -> crate::compress::GzipCompressor {
        crate::compress::GzipCompressor::new(self.compression_level)
    }
}

#[cfg(feature = "config-file")]
impl HistoryConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml_str(s: &str) -> HistoryResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| HistoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string and validate.
    pub fn from_json_str(s: &str) -> HistoryResult<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| HistoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HistoryError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> HistoryResult<String> {
        toml::to_string_pretty(self).map_err(|e| HistoryError::InvalidConfig(e.to_string()))
    }
}
