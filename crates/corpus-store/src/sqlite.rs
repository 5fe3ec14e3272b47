//! SQLite-based storage implementation.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};
use ulid::Ulid;

use corpus_core::{
    now_millis, Chunk, ChunkMetadata, CorpusError, Document, IndexStore, Result, VectorIndex,
};

use crate::schema::{META_INDEX_VERSION, META_SAVED_AT, SCHEMA};

/// SQLite-backed [`IndexStore`].
///
/// Documents and chunks live in normalized tables. A save replaces the whole
/// index inside one transaction, so readers see either the old index or the
/// new one.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,
}

/// A chunk row before conversion.
struct ChunkRow {
    id: String,
    doc_id: String,
    content: String,
    line_start: u32,
    line_end: u32,
    embedding: Option<Vec<u8>>,
    metadata: String,
}

/// A document row before conversion.
struct DocumentRow {
    id: String,
    name: String,
    raw_text: String,
    content_hash: Option<Vec<u8>>,
    created_at: i64,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| CorpusError::storage(format!("Failed to open database: {}", e)))?;

        Self::init(conn, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CorpusError::storage(format!("Failed to open in-memory database: {}", e)))?;

        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| CorpusError::storage(format!("Failed to initialize schema: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| CorpusError::storage(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| CorpusError::storage(e.to_string()))?;
        f(&mut conn)
    }

    fn write_index(conn: &mut Connection, index: &VectorIndex) -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| CorpusError::storage(e.to_string()))?;

        tx.execute_batch("DELETE FROM chunks; DELETE FROM documents; DELETE FROM index_meta;")
            .map_err(|e| CorpusError::storage(format!("Failed to clear tables: {}", e)))?;

        {
            let mut meta = tx
                .prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            meta.execute(params![META_INDEX_VERSION, index.version.to_string()])
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            meta.execute(params![META_SAVED_AT, now_millis().to_string()])
                .map_err(|e| CorpusError::storage(e.to_string()))?;

            let mut doc_stmt = tx
                .prepare(
                    r#"
                    INSERT INTO documents (id, position, name, raw_text, content_hash, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .map_err(|e| CorpusError::storage(e.to_string()))?;

            for (position, doc) in index.documents.iter().enumerate() {
                let content_hash = doc.content_hash.map(|h| h.to_vec());
                doc_stmt
                    .execute(params![
                        doc.id.to_string(),
                        position as i64,
                        doc.name,
                        doc.raw_text,
                        content_hash,
                        doc.created_at as i64,
                    ])
                    .map_err(|e| CorpusError::storage(format!("Failed to insert document: {}", e)))?;
            }

            let mut chunk_stmt = tx
                .prepare(
                    r#"
                    INSERT INTO chunks (id, doc_id, position, content, line_start, line_end,
                                        embedding, metadata)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .map_err(|e| CorpusError::storage(e.to_string()))?;

            for (position, chunk) in index.chunks.iter().enumerate() {
                let embedding = chunk.embedding.as_deref().map(vec_to_bytes);
                let metadata = serde_json::to_string(&chunk.metadata)?;
                chunk_stmt
                    .execute(params![
                        chunk.id.to_string(),
                        chunk.document_id.to_string(),
                        position as i64,
                        chunk.content,
                        chunk.line_start,
                        chunk.line_end,
                        embedding,
                        metadata,
                    ])
                    .map_err(|e| CorpusError::storage(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| CorpusError::storage(e.to_string()))?;

        Ok(())
    }

    fn read_index(conn: &Connection) -> Result<Option<VectorIndex>> {
        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![META_INDEX_VERSION],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CorpusError::storage(e.to_string()))?;

        let Some(version) = version else {
            return Ok(None);
        };
        let version: u32 = version
            .parse()
            .map_err(|_| CorpusError::invalid_index(format!("bad version {:?}", version)))?;

        let doc_rows = {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, raw_text, content_hash, created_at FROM documents ORDER BY position",
                )
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(DocumentRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        raw_text: row.get(2)?,
                        content_hash: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .map_err(|e| CorpusError::storage(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            rows
        };

        let chunk_rows = {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, doc_id, content, line_start, line_end, embedding, metadata
                    FROM chunks ORDER BY position
                    "#,
                )
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChunkRow {
                        id: row.get(0)?,
                        doc_id: row.get(1)?,
                        content: row.get(2)?,
                        line_start: row.get(3)?,
                        line_end: row.get(4)?,
                        embedding: row.get(5)?,
                        metadata: row.get(6)?,
                    })
                })
                .map_err(|e| CorpusError::storage(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CorpusError::storage(e.to_string()))?;
            rows
        };

        let mut documents = doc_rows
            .into_iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>>>()?;
        let chunks = chunk_rows
            .into_iter()
            .map(row_to_chunk)
            .collect::<Result<Vec<_>>>()?;

        for chunk in &chunks {
            if let Some(doc) = documents.iter_mut().find(|d| d.id == chunk.document_id) {
                doc.chunk_ids.push(chunk.id);
            }
        }

        let index = VectorIndex {
            version,
            documents,
            chunks,
        };
        index.validate()?;
        Ok(Some(index))
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        self.with_conn(|conn| Self::write_index(conn, index))?;
        debug!(
            "Saved index: {} documents, {} chunks",
            index.documents.len(),
            index.chunks.len()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<VectorIndex>> {
        self.with_conn(|conn| match Self::read_index(conn) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!("Stored index is unreadable, ignoring it: {}", e);
                Ok(None)
            }
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM chunks; DELETE FROM documents; DELETE FROM index_meta;")
                .map_err(|e| CorpusError::storage(format!("Failed to clear index: {}", e)))?;
            debug!("Cleared stored index");
            Ok(())
        })
    }
}

fn parse_ulid(value: &str) -> Result<Ulid> {
    Ulid::from_string(value).map_err(|e| CorpusError::storage(format!("bad id {:?}: {}", value, e)))
}

fn row_to_document(row: DocumentRow) -> Result<Document> {
    Ok(Document {
        id: parse_ulid(&row.id)?,
        name: row.name,
        raw_text: row.raw_text,
        content_hash: row.content_hash.and_then(|v| v.try_into().ok()),
        created_at: row.created_at as u64,
        chunk_ids: Vec::new(),
    })
}

fn row_to_chunk(row: ChunkRow) -> Result<Chunk> {
    let metadata: ChunkMetadata = serde_json::from_str(&row.metadata)?;
    let embedding = row.embedding.as_deref().map(bytes_to_vec).transpose()?;

    Ok(Chunk {
        id: parse_ulid(&row.id)?,
        document_id: parse_ulid(&row.doc_id)?,
        content: row.content,
        line_start: row.line_start,
        line_end: row.line_end,
        embedding,
        metadata,
    })
}

/// Convert f32 vector to bytes (little-endian).
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vec(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CorpusError::storage(format!(
            "embedding blob of {} bytes is not a whole number of f32s",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
