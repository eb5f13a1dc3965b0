//! Vector embedding engine
//!
//! Validating, caching front for an [`EmbeddingProvider`].

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::provider::EmbeddingProvider;
use crate::error::{MatchError, Result};

const DEFAULT_QUERY_CACHE: usize = 1024;

/// Vector embedding engine with caching
///
/// Corpus questions are cached in a DashMap that is pruned to the live corpus
/// after every rebuild. Free-text queries go through a bounded LRU.
pub struct VectorEngine {
    provider: Arc<dyn EmbeddingProvider>,
    corpus_cache: DashMap<String, Vec<f32>>,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
    dimension: usize,
}

impl VectorEngine {
    /// Create VectorEngine over a provider
    ///
    /// # Arguments
    /// * `provider` - The embedding backend
    /// * `query_cache_capacity` - LRU size for query vectors (0 selects the default)
    pub fn new(provider: Arc<dyn EmbeddingProvider>, query_cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(query_cache_capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_QUERY_CACHE))
            .unwrap_or(NonZeroUsize::MIN);
        let dimension = provider.dimension();

        log::info!(
            "VectorEngine ready ({}d, model {})",
            dimension,
            provider.model_name()
        );

        Self {
            provider,
            corpus_cache: DashMap::new(),
            query_cache: Mutex::new(LruCache::new(capacity)),
            dimension,
        }
    }

    /// Embed a free-text query with caching
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.query_cache.lock().get(text) {
            return Ok(cached.clone());
        }

        let embedding = self.provider.embed(text)?;
        self.check_vector(&embedding)?;
        self.query_cache
            .lock()
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Embed corpus questions, reusing vectors from earlier rebuilds
    pub fn embed_corpus(&self, texts: &[&str], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|text| self.corpus_cache.get(*text).map(|v| v.clone()))
            .collect();

        let uncached: Vec<(usize, &str)> = results
            .iter()
            .enumerate()
            .filter(|(_, cached)| cached.is_none())
            .map(|(i, _)| (i, texts[i]))
            .collect();

        if !uncached.is_empty() {
            log::debug!(
                "Embedding {} of {} questions ({} cached)",
                uncached.len(),
                texts.len(),
                texts.len() - uncached.len()
            );
        }

        // Nothing is cached unless every chunk passes
        let mut fresh: Vec<(&str, Vec<f32>)> = Vec::with_capacity(uncached.len());
        for chunk in uncached.chunks(batch_size.max(1)) {
            let chunk_texts: Vec<&str> = chunk.iter().map(|(_, t)| *t).collect();
            let embeddings = self.provider.embed_batch(&chunk_texts)?;
            if embeddings.len() != chunk_texts.len() {
                return Err(MatchError::embedding(format!(
                    "Provider returned {} vectors for {} texts",
                    embeddings.len(),
                    chunk_texts.len()
                )));
            }

            for ((idx, text), embedding) in chunk.iter().zip(embeddings) {
                self.check_vector(&embedding)?;
                fresh.push((*text, embedding.clone()));
                results[*idx] = Some(embedding);
            }
        }
        for (text, embedding) in fresh {
            self.corpus_cache.insert(text.to_string(), embedding);
        }

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| MatchError::embedding("Missing embedding after batch")))
            .collect()
    }

    /// Drop cached question vectors that are no longer in the corpus
    pub fn retain_corpus(&self, texts: &[&str]) {
        let keep: HashSet<&str> = texts.iter().copied().collect();
        self.corpus_cache.retain(|key, _| keep.contains(key.as_str()));
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
            return Err(MatchError::embedding(format!(
                "Non-finite value at index {}",
                i
            )));
        }
        Ok(())
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Get cache sizes as (corpus, query)
    pub fn cache_size(&self) -> (usize, usize) {
        (self.corpus_cache.len(), self.query_cache.lock().len())
    }

    /// Clear both caches
    pub fn clear_cache(&self) {
        self.corpus_cache.clear();
        self.query_cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GatedEmbedder, TableEmbedder};

    fn engine() -> (Arc<TableEmbedder>, VectorEngine) {
        let table = Arc::new(
            TableEmbedder::new(2)
                .with("a", vec![1.0, 0.0])
                .with("b", vec![0.0, 1.0])
                .with("bad", vec![1.0, 0.0, 0.0])
                .with("nan", vec![f32::NAN, 0.0]),
        );
        let engine = VectorEngine::new(table.clone(), 4);
        (table, engine)
    }

    #[test]
    fn test_query_cache_avoids_second_call() {
        let (table, engine) = engine();
        engine.embed_query("a").unwrap();
        engine.embed_query("a").unwrap();
        assert_eq!(table.calls(), 1);
        assert_eq!(engine.cache_size().1, 1);
    }

    #[test]
    fn test_corpus_cache_reused_across_rebuilds() {
        let (table, engine) = engine();
        let first = engine.embed_corpus(&["a", "b"], 1).unwrap();
        assert_eq!(first, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let calls = table.calls();

        engine.embed_corpus(&["b", "a"], 8).unwrap();
        assert_eq!(table.calls(), calls);
    }

    #[test]
    fn test_retain_corpus_prunes() {
        let (_, engine) = engine();
        engine.embed_corpus(&["a", "b"], 8).unwrap();
        engine.retain_corpus(&["b"]);
        assert_eq!(engine.cache_size().0, 1);
    }

    #[test]
    fn test_failed_batch_caches_nothing() {
        let (_, engine) = engine();
        assert!(engine.embed_corpus(&["a", "b", "nan"], 2).is_err());
        assert_eq!(engine.cache_size().0, 0);
    }

    #[test]
    fn test_query_not_blocked_by_corpus_embedding() {
        let table = TableEmbedder::new(2)
            .with("a", vec![1.0, 0.0])
            .with("slow", vec![0.0, 1.0]);
        let (gated, gate) = GatedEmbedder::new(table, "slow");
        let engine = Arc::new(VectorEngine::new(Arc::new(gated), 4));

        let rebuild = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.embed_corpus(&["slow"], 8))
        };
        gate.entered.recv().unwrap();

        // The corpus batch is parked inside the provider
        assert_eq!(engine.embed_query("a").unwrap(), vec![1.0, 0.0]);

        gate.release.send(()).unwrap();
        assert!(rebuild.join().unwrap().is_ok());
    }

    #[test]
    fn test_wrong_length_is_dimension_mismatch() {
        let (_, engine) = engine();
        let err = engine.embed_query("bad").unwrap_err();
        assert!(matches!(
            err,
            MatchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_non_finite_is_embedding_failure() {
        let (_, engine) = engine();
        assert!(matches!(
            engine.embed_corpus(&["a", "nan"], 8),
            Err(MatchError::EmbeddingFailure(_))
        ));
    }

    #[test]
    fn test_unknown_text_propagates_provider_error() {
        let (_, engine) = engine();
        assert!(matches!(
            engine.embed_query("zzz"),
            Err(MatchError::EmbeddingFailure(_))
        ));
    }
}
