//! Overlapping fixed-size text chunker
//!
//! Splits extracted document text into windows of `chunk_size` Unicode
//! scalar values (chars, not bytes); each chunk after the first starts
//! `overlap` chars before the end of its predecessor. The split is purely
//! positional and therefore deterministic: for input of n chars the chunk
//! count is ceil((n - overlap) / (chunk_size - overlap)), and dropping the
//! first `overlap` chars of every chunk after the first reassembles the
//! input exactly.

use crate::errors::{BotError, Result};

/// Char-window chunker with validated parameters
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, rejecting degenerate parameters.
    ///
    /// `overlap >= chunk_size` would make the window stop advancing, so it
    /// is a configuration error surfaced at startup.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BotError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(BotError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping chunks. Empty input yields an empty
    /// vector, not an error; the last chunk may be shorter than
    /// `chunk_size`.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offsets of every char boundary, plus the end of the string,
        // so windows measured in chars can be sliced without re-scanning.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_size).min(total_chars);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == total_chars {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }
}
