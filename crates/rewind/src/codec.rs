#![forbid(unsafe_code)]

//! Document <-> text conversion.
//!
//! The history never looks inside a document. It asks a [`DocumentCodec`]
//! for a canonical text form and hands that text back on restore. Both
//! directions must be deterministic: the same document state always yields
//! byte-identical text, otherwise deduplication stops working.

use crate::error::BoxError;

/// Converts a live document to canonical text and back.
pub trait DocumentCodec<D: ?Sized> {
    /// Serialize the full document state.
    fn serialize(&self, document: &D) -> Result<String, BoxError>;

    /// Replace the document's state with the one described by `text`.
    ///
    /// Implementations are expected to apply atomically: either the whole
    /// state is replaced or the document is left untouched.
    fn restore(&self, document: &mut D, text: &str) -> Result<(), BoxError>;
}

impl<D: ?Sized, C: DocumentCodec<D> + ?Sized> DocumentCodec<D> for &C {
    fn serialize(&self, document: &D) -> Result<String, BoxError> {
        (**self).serialize(document)
    }

    fn restore(&self, document: &mut D, text: &str) -> Result<(), BoxError> {
        (**self).restore(document, text)
    }
}

/// JSON codec for any serde document.
///
/// Restoring parses into a fresh value and swaps it in, so a parse failure
/// leaves the document untouched.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl<D> DocumentCodec<D> for JsonCodec
where
    D: serde::Serialize + serde::de::DeserializeOwned,
{
    fn serialize(&self, document: &D) -> Result<String, BoxError> {
        Ok(serde_json::to_string(document)?)
    }

    fn restore(&self, document: &mut D, text: &str) -> Result<(), BoxError> {
        *document = serde_json::from_str(text)?;
        Ok(())
    }
}
