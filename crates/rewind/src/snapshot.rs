#![forbid(unsafe_code)]

//! A single stored document state.

use std::fmt;

use crate::compress::Compressor;
use crate::error::{HistoryError, HistoryResult};

/// Compressed, immutable copy of one serialized document state.
///
/// A snapshot is not `Clone`: it is owned by exactly one stack
/// and moves between stacks on undo/redo.
pub struct Snapshot {
    bytes: Box<[u8]>,
    digest: blake3::Hash,
    text_len: usize,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("compressed_len", &self.bytes.len())
            .field("text_len", &self.text_len)
            .field("digest", &self.digest.to_hex().as_str())
            .finish()
    }
}

impl Snapshot {
    /// Compress `text` into a new snapshot.
    pub fn encode(text: &str, compressor: &impl Compressor) -> HistoryResult<Self> {
        let bytes = compressor.compress(text).map_err(HistoryError::Compress)?;
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            digest: blake3::hash(text.as_bytes()),
            text_len: text.len(),
        })
    }

    /// Decompress back to the serialized text.
    pub fn decode(&self, compressor: &impl Compressor) -> HistoryResult<String> {
        compressor
            .decompress(&self.bytes)
            .map_err(HistoryError::Decompress)
    }

    /// Does this snapshot hold exactly `text`?
    ///
    /// Length and digest are checked first; the snapshot is only decompressed
    /// when both match.
    pub fn holds(&self, text: &str, compressor: &impl Compressor) -> HistoryResult<bool> {
        if self.text_len != text.len() || self.digest != blake3::hash(text.as_bytes()) {
            return Ok(false);
        }
        Ok(self.decode(compressor)? == text)
    }

    /// Compressed size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Length of the uncompressed text.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// blake3 digest of the uncompressed text.
    #[must_use]
    pub fn digest(&self) -> &blake3::Hash {
        &self.digest
    }

    /// Raw stored bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
