//! corpus-query - Search and ranking
//!
//! Scores every chunk of a [`VectorIndex`] with a weighted blend of embedding
//! similarity and keyword overlap, optionally reranks with Maximal Marginal
//! Relevance, and trims the list with absolute and relative score cutoffs.
//!
//! # Example
//!
//! ```rust,ignore
//! use corpus_query::{HybridSearcher, QueryConfig};
//! use std::sync::Arc;
//!
//! let searcher = HybridSearcher::new(Arc::new(embedder));
//! let results = searcher.search("error handling", &index, 3, 0.1, false).await;
//! println!("{}", corpus_query::format_citations(&results));
//! ```

mod citation;
mod engine;
mod filter;
mod mmr;
mod scoring;

pub use citation::{citation_marker, format_citations, format_context};
pub use engine::{HybridSearcher, QueryConfig};
pub use filter::{filter_results, filter_results_with_cutoff, DEFAULT_RELATIVE_CUTOFF};
pub use mmr::{mmr_select, DEFAULT_MMR_LAMBDA};
pub use scoring::{keyword_score, keyword_tokens, score_chunks, ScoreWeights};

// Re-export for convenience
pub use corpus_core::{SearchResult, VectorIndex};
