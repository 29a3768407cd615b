#![forbid(unsafe_code)]

//! Byte transforms applied to serialized snapshots.
//!
//! A [`Compressor`] must be a lossless inverse pair for every string the
//! document codec can produce. The history treats it as opaque.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Lossless text <-> bytes transform used for stored snapshots.
pub trait Compressor {
    /// Encode serialized document text.
    fn compress(&self, text: &str) -> io::Result<Vec<u8>>;

    /// Decode bytes produced by [`compress`](Self::compress).
    fn decompress(&self, bytes: &[u8]) -> io::Result<String>;
}

impl<Z: Compressor + ?Sized> Compressor for &Z {
    fn compress(&self, text: &str) -> io::Result<Vec<u8>> {
        (**self).compress(text)
    }

    fn decompress(&self, bytes: &[u8]) -> io::Result<String> {
        (**self).decompress(bytes)
    }
}

/// Gzip via `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// Gzip at the given level (clamped to 0..=9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// The configured level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, text: &str) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(text.len() / 4 + 32), self.level);
        encoder.write_all(text.as_bytes())?;
        encoder.finish()
    }

    fn decompress(&self, bytes: &[u8]) -> io::Result<String> {
        let mut decoder = GzDecoder::new(bytes);
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// Stores the UTF-8 bytes unchanged.
///
/// Useful for tiny documents and for tests that want to inspect stored bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Compressor for Passthrough {
    fn compress(&self, text: &str) -> io::Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn decompress(&self, bytes: &[u8]) -> io::Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_inverts() {
        let gz = GzipCompressor::default();
        let text = r#"{"nodes":[{"id":1,"kind":"add"}],"links":[]}"#;
        let bytes = gz.compress(text).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(gz.decompress(&bytes).unwrap(), text);
    }

    #[test]
    fn gzip_shrinks_repetitive_text() {
        let gz = GzipCompressor::new(6);
        let text = "{\"id\":0}".repeat(500);
        let bytes = gz.compress(&text).unwrap();
        assert!(bytes.len() < text.len() / 10);
    }

    #[test]
    fn gzip_handles_empty_text() {
        let gz = GzipCompressor::default();
        let bytes = gz.compress("").unwrap();
        assert_eq!(gz.decompress(&bytes).unwrap(), "");
    }

    #[test]
    fn gzip_rejects_garbage() {
        let gz = GzipCompressor::default();
        assert!(gz.decompress(b"definitely not gzip").is_err());
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(GzipCompressor::new(42).level(), 9);
        assert_eq!(GzipCompressor::default().level(), 1);
    }

    #[test]
    fn passthrough_keeps_bytes() {
        let bytes = Passthrough.compress("héllo").unwrap();
        assert_eq!(bytes, "héllo".as_bytes());
        assert_eq!(Passthrough.decompress(&bytes).unwrap(), "héllo");
    }

    #[test]
    fn passthrough_rejects_invalid_utf8() {
        let err = Passthrough.decompress(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
