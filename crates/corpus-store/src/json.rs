//! Single-file JSON storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use corpus_core::{IndexStore, Result, VectorIndex};

/// Stores the whole index as one JSON document.
///
/// Saves go to a sibling temp file that is then renamed over the target, so
/// an interrupted save leaves the previous index in place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; parent directories are created on first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl IndexStore for JsonFileStore {
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec(index)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("Saved index to {:?} ({} bytes)", self.path, bytes.len());
        Ok(())
    }

    async fn load(&self) -> Result<Option<VectorIndex>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Index file {:?} is unreadable, ignoring it: {}", self.path, e);
                return Ok(None);
            }
        };

        let index: VectorIndex = match serde_json::from_slice(&bytes) {
            Ok(index) => index,
            Err(e) => {
                warn!("Index file {:?} is corrupt, ignoring it: {}", self.path, e);
                return Ok(None);
            }
        };

        if let Err(e) = index.validate() {
            warn!("Index file {:?} is inconsistent, ignoring it: {}", self.path, e);
            return Ok(None);
        }

        debug!("Loaded index from {:?}: {} chunks", self.path, index.chunks.len());
        Ok(Some(index))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::{Chunk, ChunkMetadata, Document};

    fn sample_index() -> VectorIndex {
        let mut doc = Document::new("a.txt", "hello world");
        let chunk = Chunk::new(doc.id, "hello world", 1, 1, ChunkMetadata::default())
            .with_embedding(vec![0.6, 0.8]);
        doc.chunk_ids.push(chunk.id);
        VectorIndex::from_parts(vec![doc], vec![chunk]).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("index.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("deep").join("index.json"));
        let index = sample_index();

        store.save(&index).await.unwrap();
        assert!(!store.temp_path().exists());

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.chunks, index.chunks);
        assert_eq!(loaded.documents[0].name, "a.txt");
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inconsistent_index_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("index.json"));

        let mut index = sample_index();
        index.documents.clear();
        let bytes = serde_json::to_vec(&index).unwrap();
        std::fs::write(store.path(), bytes).unwrap();

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_path_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::create_dir(&path).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("index.json"));
        store.save(&sample_index()).await.unwrap();

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
    }
}
