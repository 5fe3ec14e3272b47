//! Sliding-window text chunker.
//!
//! Splits text into fixed-size, overlapping windows whose boundaries are
//! snapped back to the nearest line break or space so words and lines stay
//! whole.

use corpus_core::{ChunkConfig, ChunkData, Chunker, Result};
use tracing::debug;

/// Sliding-window chunker with boundary snapping.
///
/// Window sizes and overlaps are measured in characters. Line numbers are
/// computed from the untrimmed window boundaries against the original text,
/// so a final window ending in a newline reports `line_end` one past its last
/// non-empty line (`"a\nb\n"` gives lines 1 to 3).
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindowChunker;

impl SlidingWindowChunker {
    /// Create a new chunker.
    pub fn new() -> Self {
        Self
    }

    /// Find where the window starting at `start` should end.
    ///
    /// Prefers the last newline in `start+1..=end`, then the last space, and
    /// otherwise keeps the arithmetic boundary.
    fn snap_end(chars: &[char], start: usize, end: usize) -> usize {
        if end >= chars.len() {
            return chars.len();
        }

        let window = start + 1..=end;
        if let Some(pos) = window.clone().rev().find(|&i| chars[i] == '\n') {
            return pos;
        }
        if let Some(pos) = window.rev().find(|&i| chars[i] == ' ') {
            return pos;
        }
        end
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        // newlines_before[i] = number of '\n' in chars[0..i]
        let mut newlines_before = Vec::with_capacity(chars.len() + 1);
        newlines_before.push(0u32);
        for c in &chars {
            let last = *newlines_before.last().unwrap_or(&0);
            newlines_before.push(last + u32::from(*c == '\n'));
        }

        let size = config.size.max(1);
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let end = Self::snap_end(&chars, start, start + size);

            let slice: String = chars[start..end].iter().collect();
            let content = slice.trim();
            if !content.is_empty() {
                chunks.push(ChunkData {
                    content: content.to_string(),
                    line_start: 1 + newlines_before[start],
                    line_end: 1 + newlines_before[end],
                });
            }

            let next = end.saturating_sub(config.overlap);
            start = if next > start { next } else { end };
        }

        debug!(
            "Chunked {} chars into {} chunks (size={}, overlap={})",
            chars.len(),
            chunks.len(),
            config.size,
            config.overlap
        );

        Ok(chunks)
    }
}
