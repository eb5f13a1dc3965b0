//! Feature-hashing embeddings
//!
//! Deterministic bag-of-words vectors that need no model files. Words and
//! their character trigrams are hashed into signed buckets and the result
//! is L2-normalized, so squared distances fall in `[0, 4]` like any other
//! unit-vector embedding.

use super::provider::EmbeddingProvider;
use crate::error::{MatchError, Result};

pub const DEFAULT_HASHING_DIMENSION: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.35;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "how", "i", "in", "is", "it", "me",
    "my", "of", "on", "or", "the", "to", "what", "when", "where", "which", "who", "why", "you",
];

/// Bag-of-words hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MatchError::model("Hashing dimension must be positive"));
        }
        Ok(Self {
            dimension,
            model_name: format!("hashing-fnv1a-{}", dimension),
        })
    }

    /// Tokenize text into lowercase terms without stopwords.
    ///
    /// Text made only of stopwords keeps them, so "Who?" still embeds.
    fn tokenize(text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect();
        let content: Vec<String> = words
            .iter()
            .filter(|w| !STOPWORDS.contains(w))
            .map(|w| w.to_string())
            .collect();
        if content.is_empty() {
            words.into_iter().map(String::from).collect()
        } else {
            content
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
            model_name: format!("hashing-fnv1a-{}", DEFAULT_HASHING_DIMENSION),
        }
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return Err(MatchError::embedding("Text has no indexable terms"));
        }

        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokens {
            self.add_feature(&mut vector, &token, WORD_WEIGHT);

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &trigram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(MatchError::embedding("Hashed features cancelled out"));
        }
        vector.iter_mut().for_each(|x| *x /= norm);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// 64-bit FNV-1a, stable across platforms and releases
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
