//! Hybrid search over an in-memory index.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use corpus_core::{Embedder, Result, SearchConfig, SearchResult, VectorIndex};

use crate::filter::{filter_results_with_cutoff, DEFAULT_RELATIVE_CUTOFF};
use crate::mmr::{mmr_select, DEFAULT_MMR_LAMBDA};
use crate::scoring::{score_chunks, ScoreWeights};

/// Configuration for search queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Maximum number of results to return.
    pub top_k: usize,

    /// Absolute minimum score.
    pub threshold: f32,

    /// Rerank candidates with MMR before filtering.
    pub use_reranker: bool,

    /// Semantic/lexical blend.
    pub weights: ScoreWeights,

    /// MMR relevance/diversity trade-off.
    pub mmr_lambda: f32,

    /// MMR candidate pool, as a multiple of `top_k`.
    pub candidate_multiplier: usize,

    /// Fraction of the leading score a result must reach.
    pub relative_cutoff: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.1,
            use_reranker: false,
            weights: ScoreWeights::default(),
            mmr_lambda: DEFAULT_MMR_LAMBDA,
            candidate_multiplier: 3,
            relative_cutoff: DEFAULT_RELATIVE_CUTOFF,
        }
    }
}

impl QueryConfig {
    /// Build from the `[search]` section of the config file.
    pub fn from_search_config(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            top_k: config.top_k,
            threshold: config.threshold,
            use_reranker: config.use_reranker,
            weights: ScoreWeights::new(config.semantic_weight, config.lexical_weight)?,
            mmr_lambda: config.mmr_lambda,
            candidate_multiplier: config.candidate_multiplier.max(1),
            relative_cutoff: config.relative_cutoff,
        })
    }
}

/// Hybrid semantic + keyword searcher.
///
/// Scores every chunk of the index it is handed, so the caller decides which
/// snapshot a query runs against. Searching never fails: an embedding error
/// degrades to an empty result list.
pub struct HybridSearcher<E> {
    embedder: Arc<E>,
    config: QueryConfig,
}

impl<E> HybridSearcher<E>
where
    E: Embedder,
{
    /// Create a searcher with the default configuration.
    pub fn new(embedder: Arc<E>) -> Self {
        Self::with_config(embedder, QueryConfig::default())
    }

    /// Create a searcher with an explicit configuration.
    pub fn with_config(embedder: Arc<E>, config: QueryConfig) -> Self {
        Self { embedder, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Search with the configured `top_k`, threshold and reranker setting.
    pub async fn search_default(&self, query: &str, index: &VectorIndex) -> Vec<SearchResult> {
        self.search(
            query,
            index,
            self.config.top_k,
            self.config.threshold,
            self.config.use_reranker,
        )
        .await
    }

    /// Rank the chunks of `index` against `query`.
    pub async fn search(
        &self,
        query: &str,
        index: &VectorIndex,
        top_k: usize,
        threshold: f32,
        use_reranker: bool,
    ) -> Vec<SearchResult> {
        let start = Instant::now();

        if index.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }
        if query.trim().is_empty() {
            debug!("Empty query, nothing to search");
            return Vec::new();
        }

        info!("Searching for: {:?}", query);

        let query_vector = match self.embedder.embed_query(query).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => {
                warn!("Embedder returned an empty query vector");
                return Vec::new();
            }
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                return Vec::new();
            }
        };

        let mut scored = score_chunks(query, &query_vector, index, self.config.weights);
        debug!("Scored {} chunks", scored.len());

        let candidates = if use_reranker {
            scored.truncate(top_k.saturating_mul(self.config.candidate_multiplier));
            mmr_select(scored, top_k, self.config.mmr_lambda)
        } else {
            scored.truncate(top_k);
            scored
        };

        let results = filter_results_with_cutoff(candidates, threshold, self.config.relative_cutoff);

        info!(
            "Search completed in {}ms, returned {} results",
            start.elapsed().as_millis(),
            results.len()
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corpus_core::{Chunk, ChunkMetadata, CorpusError, Document};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps texts to fixed vectors by keyword.
    struct TopicEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl TopicEmbedder {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }

        fn vector(text: &str) -> Vec<f32> {
            let t = text.to_lowercase();
            vec![
                if t.contains("cat") { 1.0 } else { 0.0 },
                if t.contains("dog") { 1.0 } else { 0.0 },
                0.1,
            ]
        }
    }

    #[async_trait]
    impl Embedder for TopicEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CorpusError::embedding("backend unavailable"));
            }
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }

        fn dimension(&self) -> Option<usize> {
            Some(3)
        }
    }

    fn pets_index() -> VectorIndex {
        let texts = [
            "The cat sat on the mat",
            "Dogs bark loudly",
            "Cats and dogs are pets",
        ];
        let mut doc = Document::new("pets.txt", &texts.join("\n"));
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let meta = ChunkMetadata {
                    source: "pets.txt".into(),
                    index: i as u32,
                    ..Default::default()
                };
                Chunk::new(doc.id, t, i as u32 + 1, i as u32 + 1, meta)
                    .with_embedding(TopicEmbedder::vector(t))
            })
            .collect();
        doc.chunk_ids = chunks.iter().map(|c| c.id).collect();
        VectorIndex::from_parts(vec![doc], chunks).unwrap()
    }

    fn lexical_only() -> QueryConfig {
        QueryConfig {
            weights: ScoreWeights::new(0.0, 1.0).unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let embedder = Arc::new(TopicEmbedder::new());
        let searcher = HybridSearcher::new(embedder.clone());
        let results = searcher.search("cat", &VectorIndex::new(), 3, 0.1, false).await;
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lexical_only_ranking() {
        let searcher = HybridSearcher::with_config(Arc::new(TopicEmbedder::new()), lexical_only());
        let results = searcher.search("cat", &pets_index(), 3, 0.1, false).await;

        let indices: Vec<u32> = results.iter().map(|r| r.chunk.metadata.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(results.iter().all(|r| r.score == 1.0));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let searcher = HybridSearcher::new(Arc::new(TopicEmbedder::failing()));
        let results = searcher.search("cat", &pets_index(), 3, 0.0, false).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query() {
        let searcher = HybridSearcher::new(Arc::new(TopicEmbedder::new()));
        assert!(searcher.search("   ", &pets_index(), 3, 0.0, false).await.is_empty());
    }

    #[tokio::test]
    async fn test_deterministic() {
        let searcher = HybridSearcher::new(Arc::new(TopicEmbedder::new()));
        let index = pets_index();
        let a = searcher.search("cats and dogs", &index, 3, 0.0, true).await;
        let b = searcher.search("cats and dogs", &index, 3, 0.0, true).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_results_sorted_and_bounded() {
        let searcher = HybridSearcher::new(Arc::new(TopicEmbedder::new()));
        let config = QueryConfig { relative_cutoff: 0.0, ..Default::default() };
        let searcher = HybridSearcher::with_config(searcher.embedder.clone(), config);

        let results = searcher.search("dog", &pets_index(), 2, 0.0, false).await;
        assert!(results.len() <= 2);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for r in &results {
            assert!((0.0..=1.0).contains(&r.score));
        }
    }

    #[tokio::test]
    async fn test_threshold_monotonic() {
        let searcher = HybridSearcher::new(Arc::new(TopicEmbedder::new()));
        let index = pets_index();
        let mut previous = usize::MAX;
        for t in [0.0, 0.2, 0.5, 0.8, 1.1] {
            let n = searcher.search("cat", &index, 3, t, false).await.len();
            assert!(n <= previous);
            previous = n;
        }
        assert_eq!(previous, 0);
    }

    #[tokio::test]
    async fn test_reranker_prefers_diverse_results() {
        let mut doc = Document::new("d", "");
        let specs: [(&str, Vec<f32>); 3] = [
            ("rust ownership rules", vec![1.0, 0.0]),
            ("rust ownership rules again", vec![1.0, 0.0]),
            ("rust ownership and borrowing", vec![0.0, 1.0]),
        ];
        let chunks: Vec<Chunk> = specs
            .iter()
            .enumerate()
            .map(|(i, (t, v))| {
                let meta = ChunkMetadata { source: "d".into(), index: i as u32, ..Default::default() };
                Chunk::new(doc.id, t, 1, 1, meta).with_embedding(v.clone())
            })
            .collect();
        doc.chunk_ids = chunks.iter().map(|c| c.id).collect();
        let index = VectorIndex::from_parts(vec![doc], chunks).unwrap();

        struct Fixed;
        #[async_trait]
        impl Embedder for Fixed {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
            fn dimension(&self) -> Option<usize> {
                Some(2)
            }
        }

        let config = QueryConfig { relative_cutoff: 0.0, ..Default::default() };
        let searcher = HybridSearcher::with_config(Arc::new(Fixed), config);

        let plain = searcher.search("rust ownership", &index, 2, 0.0, false).await;
        let plain_idx: Vec<u32> = plain.iter().map(|r| r.chunk.metadata.index).collect();
        assert_eq!(plain_idx, vec![0, 1]);

        let reranked = searcher.search("rust ownership", &index, 2, 0.0, true).await;
        let reranked_idx: Vec<u32> = reranked.iter().map(|r| r.chunk.metadata.index).collect();
        assert_eq!(reranked_idx, vec![0, 2]);
    }

    #[test]
    fn test_from_search_config() {
        let config = QueryConfig::from_search_config(&SearchConfig::default()).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.weights, ScoreWeights::LEXICAL_FAVORING);

        let bad = SearchConfig { semantic_weight: 0.9, ..Default::default() };
        assert!(QueryConfig::from_search_config(&bad).is_err());
    }
}
