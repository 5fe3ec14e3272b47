//! corpus-core - Core types and traits for the retrieval engine
//!
//! This crate provides the data model (documents, chunks, the vector index),
//! the traits that connect the chunker, embedder and store, configuration,
//! and error handling used throughout the corpus workspace.

pub mod config;
pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{CorpusError, Result};
pub use similarity::cosine_similarity;
pub use traits::*;
pub use types::*;
