//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Key/value facts about the stored index (format version, save time)
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Documents table
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    raw_text TEXT NOT NULL,
    content_hash BLOB,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_position ON documents(position);

-- Chunks table; embeddings are little-endian f32 blobs
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_chunks_position ON chunks(position);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// `index_meta` key holding the stored index's format version.
pub const META_INDEX_VERSION: &str = "index_version";

/// `index_meta` key holding the last save time (Unix millis).
pub const META_SAVED_AT: &str = "saved_at";
