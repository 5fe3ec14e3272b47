//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::{CorpusError, Result};
use crate::types::VectorIndex;

/// Embedding model trait.
///
/// Implementations resolve or fail as a unit for the whole batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order.
    ///
    /// An empty batch succeeds immediately with an empty result.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| CorpusError::embedding("No embedding returned"))
    }

    /// Embedding dimension, if known before the first request.
    fn dimension(&self) -> Option<usize>;
}

/// Persistence for a whole [`VectorIndex`].
///
/// `load` treats missing or corrupted data as "no index": it logs and returns
/// `Ok(None)` rather than an error.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Replace the stored index.
    async fn save(&self, index: &VectorIndex) -> Result<()>;

    /// Load the stored index, if one is available.
    async fn load(&self) -> Result<Option<VectorIndex>>;

    /// Remove the stored index.
    async fn clear(&self) -> Result<()>;
}

/// Chunking configuration, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Window size.
    pub size: usize,

    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Create a config, rejecting a zero window size.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(CorpusError::invalid_argument("chunk size must be positive"));
        }
        Ok(Self { size, overlap })
    }
}

/// Chunking strategy trait.
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    fn chunk(&self, text: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>>;
}

/// Raw chunk data before ID assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Chunk text content, trimmed.
    pub content: String,

    /// Start line (1-based).
    pub line_start: u32,

    /// End line (1-based, inclusive).
    pub line_end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> Option<usize> {
            Some(2)
        }
    }

    #[tokio::test]
    async fn test_embed_query_default() {
        let embedder = FixedEmbedder;
        let v = embedder.embed_query("abc").await.unwrap();
        assert_eq!(v, vec![3.0, 1.0]);
    }

    #[test]
    fn test_chunk_config() {
        assert_eq!(ChunkConfig::default(), ChunkConfig { size: 500, overlap: 50 });
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(10, 20).is_ok());
    }
}
