//! corpus-index - Index building
//!
//! This crate turns `(text, metadata)` pairs into a [`VectorIndex`]: each text
//! becomes a [`Document`](corpus_core::Document), is split by a
//! [`Chunker`](corpus_core::Chunker), and every chunk is embedded through an
//! [`Embedder`](corpus_core::Embedder) in batches.
//!
//! [`IndexHandle`] holds the current snapshot so a rebuild can replace it
//! while queries keep reading the previous one.
//!
//! # Example
//!
//! ```rust,ignore
//! use corpus_index::IndexBuilder;
//! use std::sync::Arc;
//!
//! let builder = IndexBuilder::new(SlidingWindowChunker::new(), Arc::new(client));
//! let index = builder.build(&texts, &metadatas, |status| println!("{status}")).await?;
//! ```

mod builder;
mod snapshot;

pub use builder::IndexBuilder;
pub use snapshot::IndexHandle;

// Re-export for convenience
pub use corpus_core::{SourceMetadata, VectorIndex};
