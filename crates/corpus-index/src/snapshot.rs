//! Replace-by-reference handle for the current index.

use std::sync::{Arc, RwLock};

use tracing::info;

use corpus_core::VectorIndex;

/// Holds the current [`VectorIndex`] snapshot.
///
/// Queries take an `Arc` to one immutable snapshot and keep using it for the
/// whole search; a rebuild swaps in a new snapshot without touching the one
/// in-flight queries hold.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<VectorIndex>>>,
}

impl IndexHandle {
    /// Create a handle holding `index`.
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Install a new snapshot, returning the previous one.
    pub fn replace(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let next = Arc::new(index);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!("Replacing index snapshot ({} chunks)", next.chunks.len());
        std::mem::replace(&mut *guard, next)
    }

    /// Install an empty snapshot.
    pub fn clear(&self) -> Arc<VectorIndex> {
        self.replace(VectorIndex::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::{Chunk, ChunkMetadata, Document};

    fn one_chunk_index(text: &str) -> VectorIndex {
        let mut doc = Document::new("doc", text);
        let chunk = Chunk::new(doc.id, text, 1, 1, ChunkMetadata::default());
        doc.chunk_ids.push(chunk.id);
        VectorIndex::from_parts(vec![doc], vec![chunk]).unwrap()
    }

    #[test]
    fn test_default_is_empty() {
        let handle = IndexHandle::default();
        assert!(handle.snapshot().is_empty());
    }

    #[test]
    fn test_replace_keeps_old_snapshot_intact() {
        let handle = IndexHandle::new(one_chunk_index("old"));
        let held = handle.snapshot();

        let previous = handle.replace(one_chunk_index("new"));

        assert_eq!(held.chunks[0].content, "old");
        assert_eq!(previous.chunks[0].content, "old");
        assert_eq!(handle.snapshot().chunks[0].content, "new");
    }

    #[test]
    fn test_clones_share_state() {
        let handle = IndexHandle::new(one_chunk_index("a"));
        let other = handle.clone();
        other.clear();
        assert!(handle.snapshot().is_empty());
    }
}
