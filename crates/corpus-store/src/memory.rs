//! In-memory storage.

use std::sync::RwLock;

use async_trait::async_trait;

use corpus_core::{CorpusError, IndexStore, Result, VectorIndex};

/// Keeps the saved index in process memory. Useful for tests and one-shot
/// runs that never need to persist.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<Option<VectorIndex>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        let mut slot = self
            .index
            .write()
            .map_err(|e| CorpusError::storage(e.to_string()))?;
        *slot = Some(index.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<VectorIndex>> {
        let slot = self
            .index
            .read()
            .map_err(|e| CorpusError::storage(e.to_string()))?;
        Ok(slot.clone())
    }

    async fn clear(&self) -> Result<()> {
        let mut slot = self
            .index
            .write()
            .map_err(|e| CorpusError::storage(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
