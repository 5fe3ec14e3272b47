//! Index building: chunk, embed, assemble.

use std::sync::Arc;

use tracing::{debug, info, warn};

use corpus_core::{
    Chunk, ChunkConfig, ChunkMetadata, Chunker, CorpusError, Document, Embedder, Result,
    SourceMetadata, VectorIndex,
};

/// Default number of chunk texts per embedding request.
const DEFAULT_BATCH_SIZE: usize = 32;

/// Builds a [`VectorIndex`] from raw texts.
///
/// Building is a full rebuild: the result shares nothing with any previous
/// index.
pub struct IndexBuilder<C, E> {
    chunker: C,
    embedder: Arc<E>,
    chunk_config: ChunkConfig,
    batch_size: usize,
}

impl<C, E> IndexBuilder<C, E>
where
    C: Chunker,
    E: Embedder,
{
    /// Create a builder with the default chunk config and batch size.
    pub fn new(chunker: C, embedder: Arc<E>) -> Self {
        Self {
            chunker,
            embedder,
            chunk_config: ChunkConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the chunk window.
    pub fn with_chunk_config(mut self, config: ChunkConfig) -> Self {
        self.chunk_config = config;
        self
    }

    /// Override the embedding batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build an index from `texts`, one metadata record per text.
    ///
    /// `on_progress` receives human-readable status lines. An embedding batch
    /// that fails is logged and its chunks are kept without embeddings, so
    /// they remain reachable through keyword matching.
    pub async fn build<F>(
        &self,
        texts: &[String],
        metadatas: &[SourceMetadata],
        mut on_progress: F,
    ) -> Result<VectorIndex>
    where
        F: FnMut(&str),
    {
        if texts.len() != metadatas.len() {
            return Err(CorpusError::invalid_argument(format!(
                "got {} texts but {} metadata records",
                texts.len(),
                metadatas.len()
            )));
        }

        info!("Building index from {} documents", texts.len());

        let mut documents = Vec::with_capacity(texts.len());
        let mut chunks = Vec::new();

        for (i, (text, meta)) in texts.iter().zip(metadatas).enumerate() {
            on_progress(&format!(
                "Chunking {} ({}/{})",
                meta.source,
                i + 1,
                texts.len()
            ));

            let mut doc = Document::new(&meta.source, text);
            let pieces = self.chunker.chunk(text, &self.chunk_config)?;
            debug!("{}: {} chunks", meta.source, pieces.len());

            for (idx, piece) in pieces.into_iter().enumerate() {
                let chunk = Chunk::new(
                    doc.id,
                    &piece.content,
                    piece.line_start,
                    piece.line_end,
                    ChunkMetadata::from_source(meta, idx as u32),
                );
                doc.chunk_ids.push(chunk.id);
                chunks.push(chunk);
            }
            documents.push(doc);
        }

        self.embed_chunks(&mut chunks, &mut on_progress).await;

        let index = VectorIndex::from_parts(documents, chunks)?;
        let stats = index.stats();
        on_progress(&format!(
            "Indexed {} chunks from {} documents",
            stats.chunks, stats.documents
        ));
        info!(
            "Index built: {} documents, {} chunks, {} embedded",
            stats.documents, stats.chunks, stats.embedded_chunks
        );

        Ok(index)
    }

    /// Attach embeddings to `chunks`, batch by batch.
    async fn embed_chunks<F>(&self, chunks: &mut [Chunk], on_progress: &mut F)
    where
        F: FnMut(&str),
    {
        let total = chunks.len();
        let mut done = 0usize;

        for batch in chunks.chunks_mut(self.batch_size) {
            on_progress(&format!("Embedding chunks {}-{} of {}", done + 1, done + batch.len(), total));

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for (chunk, vector) in batch.iter_mut().zip(vectors) {
                        chunk.embedding = Some(vector);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        "Embedder returned {} vectors for {} chunks; leaving batch unembedded",
                        vectors.len(),
                        batch.len()
                    );
                    on_progress("Embedding batch skipped: malformed backend response");
                }
                Err(e) => {
                    warn!("Embedding batch failed: {}", e);
                    on_progress(&format!("Embedding batch skipped: {}", e));
                }
            }

            done += batch.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corpus_chunk::SlidingWindowChunker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by text length; fails every `fail_every`-th call if set.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_every: Option<usize>,
    }

    impl CountingEmbedder {
        fn new(fail_every: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(n) = self.fail_every {
                if call % n == 0 {
                    return Err(CorpusError::embedding("backend crashed"));
                }
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> Option<usize> {
            Some(2)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_build_index() {
        let embedder = Arc::new(CountingEmbedder::new(None));
        let builder = IndexBuilder::new(SlidingWindowChunker::new(), embedder.clone());

        let texts = strings(&["The cat sat on the mat", "Dogs bark loudly"]);
        let metas = vec![SourceMetadata::new("cats.txt"), SourceMetadata::new("dogs.txt")];

        let mut messages = Vec::new();
        let index = builder
            .build(&texts, &metas, |m| messages.push(m.to_string()))
            .await
            .unwrap();

        assert_eq!(index.documents.len(), 2);
        assert_eq!(index.chunks.len(), 2);
        assert!(index.validate().is_ok());
        assert!(index.chunks.iter().all(|c| c.embedding.is_some()));
        assert_eq!(index.chunks[1].metadata.source, "dogs.txt");
        assert_eq!(index.documents[0].name, "cats.txt");
        assert!(!messages.is_empty());
        assert!(messages.last().unwrap().contains("2 chunks"));
    }

    #[tokio::test]
    async fn test_metadata_mismatch() {
        let builder = IndexBuilder::new(SlidingWindowChunker::new(), Arc::new(CountingEmbedder::new(None)));
        let err = builder
            .build(&strings(&["a", "b"]), &[SourceMetadata::new("a")], |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_batches_and_failed_batch_leaves_chunks_unembedded() {
        let embedder = Arc::new(CountingEmbedder::new(Some(2)));
        let builder = IndexBuilder::new(SlidingWindowChunker::new(), embedder.clone())
            .with_chunk_config(ChunkConfig { size: 10, overlap: 0 })
            .with_batch_size(2);

        let text = "alpha beta gamma delta epsilon zeta eta theta".to_string();
        let index = builder
            .build(&[text], &[SourceMetadata::new("greek.txt")], |_| {})
            .await
            .unwrap();

        let n = index.chunks.len();
        assert!(n > 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), n.div_ceil(2));
        // Second batch (chunks 2 and 3) failed.
        assert!(index.chunks[0].embedding.is_some());
        assert!(index.chunks[2].embedding.is_none());
        assert!(index.validate().is_ok());
    }

    #[tokio::test]
    async fn test_chunk_metadata_carries_index_and_extras() {
        let builder = IndexBuilder::new(SlidingWindowChunker::new(), Arc::new(CountingEmbedder::new(None)))
            .with_chunk_config(ChunkConfig { size: 6, overlap: 0 });

        let meta = SourceMetadata::new("lines.txt").with_field("origin", "upload");
        let index = builder
            .build(&strings(&["line1\nline2\nline3\n"]), &[meta], |_| {})
            .await
            .unwrap();

        let indices: Vec<u32> = index.chunks.iter().map(|c| c.metadata.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(index.chunks.iter().all(|c| c.metadata.extra["origin"] == "upload"));
        assert_eq!(index.documents[0].chunk_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let builder = IndexBuilder::new(SlidingWindowChunker::new(), Arc::new(CountingEmbedder::new(None)));
        let index = builder.build(&[], &[], |_| {}).await.unwrap();
        assert!(index.is_empty());
    }
}
