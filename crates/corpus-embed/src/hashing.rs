//! Deterministic feature-hashing embedder.
//!
//! Needs no model files: every lower-cased word and character trigram is
//! hashed into a bucket of a fixed-size vector, which is then L2 normalized.
//! Texts sharing vocabulary get a positive cosine similarity, which is enough
//! for offline use and for exercising the retrieval pipeline in tests.

use corpus_core::{CorpusError, Result};

use crate::backend::{l2_normalize, EmbeddingBackend, ProgressFn};

/// Feature-hashing backend.
#[derive(Debug, Clone)]
pub struct HashingBackend {
    dimension: usize,
}

impl HashingBackend {
    /// Create a backend producing vectors of the given size.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embed one text.
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            embedding[bucket(word.as_bytes(), self.dimension)] += 1.0;

            let chars: Vec<char> = word.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                embedding[bucket(gram.as_bytes(), self.dimension)] += 0.5;
            }
        }

        l2_normalize(embedding)
    }
}

impl Default for HashingBackend {
    fn default() -> Self {
        Self::new(384)
    }
}

/// FNV-1a hash reduced to a bucket index.
fn bucket(bytes: &[u8], buckets: usize) -> usize {
    let hash = bytes.iter().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ u64::from(*b)).wrapping_mul(0x100000001b3)
    });
    (hash % buckets as u64) as usize
}

impl EmbeddingBackend for HashingBackend {
    fn load(&mut self, progress: ProgressFn<'_>) -> Result<()> {
        if self.dimension == 0 {
            return Err(CorpusError::embedding("Hashing dimension must be positive"));
        }
        progress(100, "hashing embedder ready");
        Ok(())
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::cosine_similarity;

    fn embed(backend: &mut HashingBackend, text: &str) -> Vec<f32> {
        backend.embed_batch(&[text.to_string()]).unwrap().remove(0)
    }

    #[test]
    fn test_dimension_and_normalization() {
        let mut backend = HashingBackend::new(64);
        let v = embed(&mut backend, "Rust is great");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let mut backend = HashingBackend::default();
        assert_eq!(embed(&mut backend, "same input"), embed(&mut backend, "same input"));
    }

    #[test]
    fn test_shared_vocabulary_is_more_similar() {
        let mut backend = HashingBackend::default();
        let cat = embed(&mut backend, "the cat sat on the mat");
        let cats = embed(&mut backend, "cats sit on mats");
        let finance = embed(&mut backend, "quarterly revenue forecast");
        assert!(cosine_similarity(&cat, &cats) > cosine_similarity(&cat, &finance));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let mut backend = HashingBackend::new(8);
        assert!(embed(&mut backend, "   ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimension_fails_load() {
        let mut backend = HashingBackend::new(0);
        let mut noop = |_: u8, _: &str| {};
        assert!(backend.load(&mut noop).is_err());
    }
}
