//! corpus-chunk - Text chunking
//!
//! This crate splits raw document text into overlapping, boundary-aware
//! windows, each tagged with the line range it came from in the original
//! text.
//!
//! # Example
//!
//! ```rust
//! use corpus_chunk::{ChunkConfig, Chunker, SlidingWindowChunker};
//!
//! let chunker = SlidingWindowChunker::new();
//! let config = ChunkConfig::default();
//! let chunks = chunker.chunk("Hello world", &config).unwrap();
//! assert_eq!(chunks[0].line_start, 1);
//! ```

mod window;

pub use window::SlidingWindowChunker;

// Re-export types for convenience
pub use corpus_core::{ChunkConfig, ChunkData, Chunker};
