#![forbid(unsafe_code)]

//! Error taxonomy for the history core.
//!
//! Boundary conditions (nothing to undo, nothing to redo) are *not* errors;
//! they surface as `Ok(false)` from the transition methods. Everything here
//! is either a collaborator failure (codec, compressor, listener) or misuse.

use std::fmt;
use std::io;

/// Boxed error produced by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Which of the two snapshot stacks an operation addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    /// Oldest-first history whose last entry is the current state.
    Past,
    /// Undone states, most recently undone last.
    Future,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Past => f.write_str("past"),
            Self::Future => f.write_str("future"),
        }
    }
}

/// Errors raised by the snapshot history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The document codec failed to serialize the live document.
    #[error("failed to serialize document")]
    Serialize(#[source] BoxError),

    /// The document codec failed to apply a snapshot to the live document.
    #[error("failed to restore document from snapshot")]
    Restore(#[source] BoxError),

    /// The compressor rejected a serialized snapshot.
    #[error("failed to compress snapshot")]
    Compress(#[source] io::Error),

    /// A stored snapshot could not be turned back into text.
    #[error("failed to decompress snapshot")]
    Decompress(#[source] io::Error),

    /// `pop` on an empty stack.
    #[error("{0} stack is empty")]
    EmptyStack(StackKind),

    /// An undo or redo was requested while another one is still running.
    #[error("an undo/redo transition is already in progress")]
    TransitionInProgress,

    /// Shared state was already borrowed by the caller.
    #[error("{0} is already borrowed")]
    Busy(&'static str),

    /// The history (or its session) has been disposed.
    #[error("history has been disposed")]
    Disposed,

    /// A configuration value is out of range.
    #[error("invalid history configuration: {0}")]
    InvalidConfig(String),

    /// A notification listener failed while handling an event.
    #[error("listener for {channel} failed")]
    Listener {
        channel: &'static str,
        #[source]
        source: BoxError,
    },
}

impl HistoryError {
    /// Wrap an arbitrary listener failure for the given channel.
    pub fn listener(channel: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Listener {
            channel,
            source: source.into(),
        }
    }

    /// True for the codec and compressor failures that are propagated unmodified.
    #[must_use]
    pub fn is_codec_failure(&self) -> bool {
        matches!(
            self,
            Self::Serialize(_) | Self::Restore(_) | Self::Compress(_) | Self::Decompress(_)
        )
    }
}
