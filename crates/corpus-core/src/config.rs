//! Configuration types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CorpusError, Result};
use crate::traits::ChunkConfig;

/// Tolerance when checking that score weights sum to one.
const WEIGHT_EPSILON: f32 = 1e-6;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Persistence configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Overlap between consecutive windows in characters.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    /// Convert into the chunker's runtime config.
    pub fn to_chunk_config(&self) -> Result<ChunkConfig> {
        ChunkConfig::new(self.size, self.overlap)
    }
}

/// Which embedding backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Deterministic feature-hashing embedder, no model files needed.
    Hashing,
    /// ONNX Runtime sentence-embedding model.
    Onnx,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend selection.
    #[serde(default = "default_backend")]
    pub backend: EmbeddingBackendKind,

    /// Path to the ONNX model file.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to the tokenizer.json file.
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Texts per embedding request when building an index.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Vector size for the hashing backend.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            batch_size: default_batch_size(),
            num_threads: default_num_threads(),
            dimension: default_dimension(),
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Absolute score cutoff.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Apply MMR diversity reranking.
    #[serde(default)]
    pub use_reranker: bool,

    /// Weight of the semantic (cosine) component.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Weight of the lexical (keyword) component.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// MMR relevance/diversity trade-off (1 = relevance only).
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,

    /// Candidate pool size for MMR, as a multiple of top_k.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Keep only results scoring at least this fraction of the best score.
    #[serde(default = "default_relative_cutoff")]
    pub relative_cutoff: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
            use_reranker: false,
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            mmr_lambda: default_mmr_lambda(),
            candidate_multiplier: default_candidate_multiplier(),
            relative_cutoff: default_relative_cutoff(),
        }
    }
}

/// Which persistence adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// JSON file.
    Json,
    /// SQLite database.
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Adapter selection.
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackendKind,

    /// Location of the stored index.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

// Default value functions

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::Hashing
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_dimension() -> usize {
    384
}

fn default_top_k() -> usize {
    3
}

fn default_threshold() -> f32 {
    0.1
}

fn default_semantic_weight() -> f32 {
    0.3
}

fn default_lexical_weight() -> f32 {
    0.7
}

fn default_mmr_lambda() -> f32 {
    0.7
}

fn default_candidate_multiplier() -> usize {
    3
}

fn default_relative_cutoff() -> f32 {
    0.85
}

fn default_store_backend() -> StoreBackendKind {
    StoreBackendKind::Json
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corpus")
}

fn default_model_path() -> PathBuf {
    data_dir().join("models").join("all-MiniLM-L6-v2").join("model.onnx")
}

fn default_tokenizer_path() -> PathBuf {
    data_dir()
        .join("models")
        .join("all-MiniLM-L6-v2")
        .join("tokenizer.json")
}

fn default_store_path() -> PathBuf {
    data_dir().join("index.json")
}

impl CorpusConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CorpusError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("corpus").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("corpus.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            return Err(CorpusError::config("chunking.size must be positive"));
        }

        let s = &self.search;
        if s.semantic_weight < 0.0 || s.lexical_weight < 0.0 {
            return Err(CorpusError::config("search weights must be non-negative"));
        }
        if (s.semantic_weight + s.lexical_weight - 1.0).abs() > WEIGHT_EPSILON {
            return Err(CorpusError::config(format!(
                "search weights must sum to 1 (got {} + {})",
                s.semantic_weight, s.lexical_weight
            )));
        }
        if !(0.0..=1.0).contains(&s.mmr_lambda) {
            return Err(CorpusError::config("search.mmr_lambda must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&s.relative_cutoff) {
            return Err(CorpusError::config(
                "search.relative_cutoff must be within [0, 1]",
            ));
        }
        if s.candidate_multiplier == 0 {
            return Err(CorpusError::config(
                "search.candidate_multiplier must be positive",
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(CorpusError::config("embedding.batch_size must be positive"));
        }

        Ok(())
    }
}
