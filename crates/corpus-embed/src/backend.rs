//! The contract between the embedding worker and a model backend.

use corpus_core::Result;

/// Advisory progress events published by the embedding worker.
///
/// Delivered zero or more times; nothing depends on receiving them.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedProgress {
    /// Backend is initializing (downloading, loading weights, ...).
    Loading { percent: u8, message: String },

    /// Backend finished loading.
    Ready { dimension: usize },

    /// Backend failed to load; every request will fail.
    Failed { message: String },

    /// A batch was picked up by the worker.
    Started { request_id: u64, texts: usize },
}

/// Callback a backend uses to report loading progress (percent, message).
pub type ProgressFn<'a> = &'a mut dyn FnMut(u8, &str);

/// A model that turns texts into vectors.
///
/// Backends are owned by a single worker thread and are never shared, so
/// they only need to be `Send`. Calls are synchronous and may block.
pub trait EmbeddingBackend: Send + 'static {
    /// Prepare the backend. Called once by the worker before any batch.
    fn load(&mut self, progress: ProgressFn<'_>) -> Result<()>;

    /// Embed a batch of texts, one vector per text, all the same length.
    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output dimension, once known.
    fn dimension(&self) -> Option<usize>;
}

/// L2 normalize a vector in place.
pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

impl EmbeddingBackend for Box<dyn EmbeddingBackend> {
    fn load(&mut self, progress: ProgressFn<'_>) -> Result<()> {
        (**self).load(progress)
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> Option<usize> {
        (**self).dimension()
    }
}
