//! corpus-embed - Embedding client and backends
//!
//! This crate turns texts into fixed-length vectors. The model runs on a
//! dedicated worker thread behind [`EmbeddingClient`], which callers reach
//! asynchronously through the [`Embedder`] trait.
//!
//! # Features
//!
//! - Request/response message passing with per-request correlation ids
//! - Advisory progress events while the backend loads
//! - Whole-batch failure semantics (one bad item fails the batch)
//! - ONNX Runtime backend with mean pooling and L2 normalization
//! - Deterministic feature-hashing backend for offline use and tests

mod backend;
mod client;
mod hashing;
mod onnx;

pub use backend::{EmbedProgress, EmbeddingBackend, ProgressFn};
pub use client::EmbeddingClient;
pub use hashing::HashingBackend;
pub use onnx::OnnxBackend;

// Re-export the Embedder trait for convenience
pub use corpus_core::Embedder;

use corpus_core::{EmbeddingBackendKind, EmbeddingConfig, Result};

/// Build the backend selected by `config`.
pub fn backend_from_config(config: &EmbeddingConfig) -> Box<dyn EmbeddingBackend> {
    match config.backend {
        EmbeddingBackendKind::Hashing => Box::new(HashingBackend::new(config.dimension)),
        EmbeddingBackendKind::Onnx => Box::new(
            OnnxBackend::new(&config.model_path, &config.tokenizer_path)
                .with_threads(config.num_threads),
        ),
    }
}

impl EmbeddingClient {
    /// Spawn a client for the backend selected by `config`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::spawn(backend_from_config(config))
    }
}
