//! Overlapping character-window text splitter.
//!
//! Divides text into chunks of at most `chunk_size` characters, where
//! each chunk after the first begins with the trailing `chunk_overlap`
//! characters of its predecessor. The overlap carries local context
//! across chunk boundaries so a query landing near a boundary still
//! retrieves a coherent fragment.
//!
//! Splitting is pure: the same text and configuration always produce the
//! same chunk sequence.

use anyhow::{bail, Result};

/// Deterministic splitter configured with a size and overlap in characters.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    /// Requires `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into ordered overlapping chunks.
    ///
    /// Windows advance by `chunk_size - chunk_overlap` characters, so the
    /// tail of chunk *i* of length `chunk_overlap` equals the head of
    /// chunk *i+1*. Empty input yields no chunks; input that fits in one
    /// window yields exactly one.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let stride = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        chunks
    }
}
