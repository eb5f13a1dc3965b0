//! Embedding provider contract

use crate::error::Result;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for identical input within a
/// process lifetime, keep [`dimension`](Self::dimension) constant, and be
/// safe to call from many threads at once.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, one vector per input in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Identifier stored alongside persisted vectors
    fn model_name(&self) -> &str;
}
