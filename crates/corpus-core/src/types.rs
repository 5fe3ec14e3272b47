//! Core domain types for the retrieval engine.
//!
//! Serialized field names are camelCase so a persisted [`VectorIndex`] keeps
//! the `{version, documents, chunks}` JSON shape shared with other clients.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ulid::Ulid;

use crate::error::{CorpusError, Result};

/// Current on-disk index format version.
pub const INDEX_VERSION: u32 = 1;

/// Caller-supplied metadata for one ingested text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Human-readable source name, used for citation display.
    pub source: String,

    /// Arbitrary additional fields, carried through to every chunk.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SourceMetadata {
    /// Create metadata with only a source name.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            extra: HashMap::new(),
        }
    }

    /// Attach an extra key-value field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Metadata attached to each chunk.
///
/// `source` and `index` are read by the engine; everything else is opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source name inherited from the document.
    pub source: String,

    /// Position of the chunk within its document (0-based).
    pub index: u32,

    /// Caller-supplied fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Derive chunk metadata from the document's source metadata.
    pub fn from_source(source: &SourceMetadata, index: u32) -> Self {
        Self {
            source: source.source.clone(),
            index,
            extra: source.extra.clone(),
        }
    }
}

/// A document in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Display name (the source name).
    pub name: String,

    /// Original raw text.
    pub raw_text: String,

    /// Blake3 hash of the raw text.
    #[serde(default, with = "serde_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<[u8; 32]>,

    /// Creation timestamp (Unix millis).
    pub created_at: u64,

    /// Chunks belonging to this document, in order.
    #[serde(default)]
    pub chunk_ids: Vec<Ulid>,
}

impl Document {
    /// Create a new document with no chunks yet.
    pub fn new(name: &str, raw_text: &str) -> Self {
        let content_hash = blake3::hash(raw_text.as_bytes());

        Self {
            id: Ulid::new(),
            name: name.to_string(),
            raw_text: raw_text.to_string(),
            content_hash: Some(*content_hash.as_bytes()),
            created_at: now_millis(),
            chunk_ids: Vec::new(),
        }
    }

    /// Check if content has changed by comparing hashes.
    pub fn content_changed(&self, new_content: &str) -> bool {
        let new_hash = blake3::hash(new_content.as_bytes());
        self.content_hash
            .map(|h| h != *new_hash.as_bytes())
            .unwrap_or(true)
    }
}

/// A chunk of a document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Parent document ID.
    pub document_id: Ulid,

    /// Chunk text, trimmed.
    pub content: String,

    /// Start line in the original document (1-based).
    pub line_start: u32,

    /// End line in the original document (1-based, inclusive).
    pub line_end: u32,

    /// Embedding vector, absent until the embedder has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Citation and caller metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk without an embedding.
    pub fn new(
        document_id: Ulid,
        content: &str,
        line_start: u32,
        line_end: u32,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            id: Ulid::new(),
            document_id,
            content: content.to_string(),
            line_start,
            line_end,
            embedding: None,
            metadata,
        }
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// The persisted aggregate of all documents and their chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Format version.
    pub version: u32,

    /// Ingested documents.
    pub documents: Vec<Document>,

    /// Flat view of every document's chunks, in document order.
    pub chunks: Vec<Chunk>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            documents: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Assemble an index, checking its invariants.
    pub fn from_parts(documents: Vec<Document>, chunks: Vec<Chunk>) -> Result<Self> {
        let index = Self {
            version: INDEX_VERSION,
            documents,
            chunks,
        };
        index.validate()?;
        Ok(index)
    }

    /// True if the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Find a document by ID.
    pub fn document(&self, id: Ulid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Check the structural invariants of the index.
    ///
    /// Every chunk must reference a document of this index, every document's
    /// chunk list must resolve, and the flat chunk count must equal the sum of
    /// the per-document counts.
    pub fn validate(&self) -> Result<()> {
        if self.version != INDEX_VERSION {
            return Err(CorpusError::invalid_index(format!(
                "unsupported version {} (expected {})",
                self.version, INDEX_VERSION
            )));
        }

        let doc_ids: HashSet<Ulid> = self.documents.iter().map(|d| d.id).collect();
        if let Some(orphan) = self.chunks.iter().find(|c| !doc_ids.contains(&c.document_id)) {
            return Err(CorpusError::invalid_index(format!(
                "chunk {} references missing document {}",
                orphan.id, orphan.document_id
            )));
        }

        let expected: usize = self.documents.iter().map(|d| d.chunk_ids.len()).sum();
        if expected != self.chunks.len() {
            return Err(CorpusError::invalid_index(format!(
                "documents list {} chunks but index holds {}",
                expected,
                self.chunks.len()
            )));
        }

        let chunk_ids: HashSet<Ulid> = self.chunks.iter().map(|c| c.id).collect();
        for doc in &self.documents {
            if let Some(missing) = doc.chunk_ids.iter().find(|id| !chunk_ids.contains(id)) {
                return Err(CorpusError::invalid_index(format!(
                    "document {} lists missing chunk {}",
                    doc.id, missing
                )));
            }
        }

        Ok(())
    }

    /// Summary counts for display.
    pub fn stats(&self) -> IndexStats {
        let embedded: Vec<&Vec<f32>> = self
            .chunks
            .iter()
            .filter_map(|c| c.embedding.as_ref())
            .collect();

        IndexStats {
            documents: self.documents.len() as u64,
            chunks: self.chunks.len() as u64,
            embedded_chunks: embedded.len() as u64,
            dimension: embedded.first().map(|e| e.len()),
        }
    }
}

/// A scored chunk returned from a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,

    /// Relevance score (higher is better).
    pub score: f32,
}

impl SearchResult {
    /// Create a new result.
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }

    /// Source name for citation display.
    pub fn source(&self) -> &str {
        &self.chunk.metadata.source
    }
}

/// Statistics about an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of documents.
    pub documents: u64,

    /// Number of chunks.
    pub chunks: u64,

    /// Number of chunks carrying an embedding.
    pub embedded_chunks: u64,

    /// Embedding dimension, if any chunk is embedded.
    pub dimension: Option<usize>,
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Helper module for optional byte array serialization.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let hex = hex::encode(bytes);
                hex.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(hex) => {
                let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("invalid hash length"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}
