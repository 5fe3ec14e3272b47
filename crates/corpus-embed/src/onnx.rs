//! ONNX-based embedding backend.

use std::path::{Path, PathBuf};

use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use corpus_core::{CorpusError, Result};

use crate::backend::{l2_normalize, EmbeddingBackend, ProgressFn};

/// Default maximum sequence length (MiniLM-class sentence encoders).
const DEFAULT_MAX_TOKENS: usize = 512;

/// Sentence-embedding backend running an ONNX model with a HuggingFace
/// tokenizer. Token embeddings are mean-pooled under the attention mask and
/// L2 normalized.
///
/// The model is loaded in [`EmbeddingBackend::load`], on the worker thread,
/// so constructing the backend is cheap.
pub struct OnnxBackend {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
    num_threads: usize,
    max_tokens: usize,
    token_type_ids: bool,
    session: Option<Session>,
    tokenizer: Option<Tokenizer>,
    dimension: Option<usize>,
}

impl OnnxBackend {
    /// Create a backend for the given model and tokenizer files.
    pub fn new(model_path: impl AsRef<Path>, tokenizer_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            tokenizer_path: tokenizer_path.as_ref().to_path_buf(),
            num_threads: 4,
            max_tokens: DEFAULT_MAX_TOKENS,
            token_type_ids: true,
            session: None,
            tokenizer: None,
            dimension: None,
        }
    }

    /// Set the number of intra-op inference threads.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    /// Set the maximum sequence length; longer inputs are truncated.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Whether the model takes a `token_type_ids` input (BERT-style exports
    /// do; nomic and other rotary models do not).
    pub fn with_token_type_ids(mut self, enabled: bool) -> Self {
        self.token_type_ids = enabled;
        self
    }

    fn run_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let tokenizer = self
            .tokenizer
            .as_ref()
            .ok_or_else(|| CorpusError::embedding("Tokenizer not loaded"))?;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CorpusError::embedding("Model not loaded"))?;

        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let encodings = tokenizer
            .encode_batch(refs, true)
            .map_err(|e| CorpusError::embedding(format!("Tokenization failed: {}", e)))?;

        // Get max length for padding
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens);

        let batch_size = encodings.len();
        debug!("Embedding batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];
        let mut masks: Vec<Vec<u32>> = Vec::with_capacity(batch_size);

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = type_ids.get(j).copied().unwrap_or(0) as i64;
            }
            masks.push(mask.iter().take(len).copied().collect());
        }

        let input_ids_tensor = Tensor::from_array((vec![batch_size, max_len], input_ids))
            .map_err(|e| CorpusError::embedding(format!("Failed to create input tensor: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((vec![batch_size, max_len], attention_mask))
            .map_err(|e| CorpusError::embedding(format!("Failed to create mask tensor: {}", e)))?;

        let run_result = if self.token_type_ids {
            let token_type_tensor = Tensor::from_array((vec![batch_size, max_len], token_type_ids))
                .map_err(|e| {
                    CorpusError::embedding(format!("Failed to create token type tensor: {}", e))
                })?;
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_tensor
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])
        };
        let outputs =
            run_result.map_err(|e| CorpusError::embedding(format!("Inference failed: {}", e)))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| CorpusError::embedding("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| CorpusError::embedding(format!("Failed to extract tensor: {}", e)))?;

        let shape: Vec<usize> = view.shape().to_vec();
        debug!("Output shape: {:?}", shape);

        match shape.len() {
            // (batch, seq, hidden): pool over the sequence
            3 => Ok(mean_pool(&view, &masks)),
            // (batch, hidden): already pooled
            2 => Ok((0..batch_size)
                .map(|i| l2_normalize((0..shape[1]).map(|j| view[[i, j]]).collect()))
                .collect()),
            _ => Err(CorpusError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape
            ))),
        }
    }
}

/// Mean pooling over the sequence dimension with the attention mask.
fn mean_pool(tensor: &ArrayViewD<'_, f32>, masks: &[Vec<u32>]) -> Vec<Vec<f32>> {
    let shape = tensor.shape();
    let seq_len = shape[1];
    let hidden_dim = shape[2];

    masks
        .iter()
        .enumerate()
        .map(|(i, mask)| {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;
            for (j, &m) in mask.iter().enumerate().take(seq_len) {
                if m == 1 {
                    valid += 1;
                    for (k, slot) in sum.iter_mut().enumerate() {
                        *slot += tensor[[i, j, k]];
                    }
                }
            }

            if valid == 0 {
                return sum;
            }
            l2_normalize(sum.into_iter().map(|s| s / valid as f32).collect())
        })
        .collect()
}

impl EmbeddingBackend for OnnxBackend {
    fn load(&mut self, progress: ProgressFn<'_>) -> Result<()> {
        progress(0, "loading tokenizer");
        info!("Loading tokenizer from {:?}", self.tokenizer_path);
        let tokenizer = Tokenizer::from_file(&self.tokenizer_path)
            .map_err(|e| CorpusError::embedding(format!("Failed to load tokenizer: {}", e)))?;

        progress(20, "loading model");
        info!("Loading ONNX model from {:?}", self.model_path);
        let session = Session::builder()
            .map_err(|e| CorpusError::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CorpusError::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(self.num_threads)
            .map_err(|e| CorpusError::embedding(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(&self.model_path)
            .map_err(|e| CorpusError::embedding(format!("Failed to load model: {}", e)))?;

        self.tokenizer = Some(tokenizer);
        self.session = Some(session);

        // One tiny batch tells us the output dimension.
        progress(90, "warming up");
        let probe = self.run_batch(&["warmup".to_string()])?;
        let dimension = probe.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(CorpusError::embedding("Model produced empty embeddings"));
        }
        self.dimension = Some(dimension);

        progress(100, "model ready");
        info!("Embedder initialized: dim={}, max_tokens={}", dimension, self.max_tokens);
        Ok(())
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run_batch(texts)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = OnnxBackend::new(dir.path().join("model.onnx"), dir.path().join("tokenizer.json"));
        let mut events = Vec::new();
        let mut record = |p: u8, m: &str| events.push((p, m.to_string()));

        let err = backend.load(&mut record).unwrap_err();
        assert_eq!(err.error_code(), "EMBEDDING_ERROR");
        assert_eq!(events.first().map(|e| e.0), Some(0));
        assert_eq!(backend.dimension(), None);
    }

    #[test]
    fn test_embed_before_load_fails() {
        let mut backend = OnnxBackend::new("model.onnx", "tokenizer.json");
        assert!(backend.embed_batch(&["text".to_string()]).is_err());
        assert!(backend.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_builder_clamps() {
        let backend = OnnxBackend::new("m", "t").with_threads(0).with_max_tokens(0);
        assert_eq!(backend.num_threads, 1);
        assert_eq!(backend.max_tokens, 1);
    }
}
