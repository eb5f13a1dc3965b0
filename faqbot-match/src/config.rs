//! Matching configuration

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Squared Euclidean distance above which a nearest neighbour is not trusted.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 1.0;

/// Reply given whenever no confident answer exists.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "I'm sorry, I couldn't find a relevant answer to your question. Please try rephrasing or contact support.";

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Maximum accepted squared distance (default: 1.0)
    pub distance_threshold: f32,
    /// Message returned for `NoMatch`
    pub fallback_message: String,
    /// Query embeddings kept in the LRU cache (default: 1024)
    pub query_cache_capacity: usize,
    /// Questions per `embed_batch` call during rebuild (default: 256)
    pub embed_batch_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            query_cache_capacity: 1024,
            embed_batch_size: 256,
        }
    }
}

impl MatchConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    /// Reject values the engine cannot serve with
    pub fn validate(&self) -> Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(MatchError::config(format!(
                "distance_threshold must be a finite non-negative number, got {}",
                self.distance_threshold
            )));
        }
        if self.fallback_message.trim().is_empty() {
            return Err(MatchError::config("fallback_message must not be empty"));
        }
        if self.embed_batch_size == 0 {
            return Err(MatchError::config("embed_batch_size must be at least 1"));
        }
        Ok(())
    }
}
