//! FastEmbed sentence embeddings
//!
//! all-MiniLM-L6-v2 (384 dimensions) through ONNX Runtime. Model files are
//! downloaded into the cache directory on first use.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;

use super::provider::EmbeddingProvider;
use crate::error::{MatchError, Result};

const MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// FastEmbed embedding model wrapper
///
/// `TextEmbedding::embed` takes `&self`, so queries and rebuild batches run
/// against the same session concurrently.
pub struct FastEmbedProvider {
    model: TextEmbedding,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load the model, caching downloads under `cache_dir`
    pub fn new(cache_dir: &Path) -> Result<Self> {
        log::info!("Loading {} (cache: {})", MODEL_NAME, cache_dir.display());

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| MatchError::model(format!("Failed to load {}: {}", MODEL_NAME, e)))?;

        // Get dimension by encoding test string
        let test_embed = model
            .embed(vec!["test"], None)
            .map_err(|e| MatchError::model(format!("Failed to encode test string: {}", e)))?;
        let dimension = test_embed
            .first()
            .map(|v| v.len())
            .ok_or_else(|| MatchError::model("Model returned no test embedding"))?;

        log::info!("Loaded {} ({}d)", MODEL_NAME, dimension);

        Ok(Self {
            model,
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text])?;
        embeddings
            .pop()
            .ok_or_else(|| MatchError::embedding("Model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| MatchError::embedding(format!("Failed to encode texts: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
