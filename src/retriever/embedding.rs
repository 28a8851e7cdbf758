//! Embedding backend for the corpus retriever.
//!
//! Trait-based so production code can use fastembed-rs (behind the
//! `embeddings` feature) while tests use deterministic mock embedders.
//! Embedding computation is an external capability; the retriever only
//! consumes vectors.

use thiserror::Error;

/// Error type for embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,
    #[error("embedding model error: {0}")]
    ModelError(String),
}

/// Trait for embedding text into vectors.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResult)
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// FastEmbedEmbedder — production embedder behind `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `Embedder` trait uses `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
            })
        }

        /// Default model (nomic-embed-text-v1.5).
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;
