//! Confidence-thresholded question matching
//!
//! [`MatchEngine::match_query`] is the only boundary where internal faults
//! are turned into `NoMatch`; everything below it returns `Result`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::embedding::VectorEngine;
use crate::error::Result;
use crate::generation::ActiveIndex;

/// A confident nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedAnswer {
    pub answer: String,
    /// Curated question the query matched
    pub question: String,
    /// Squared Euclidean distance to that question
    pub distance: f32,
    /// Generation that produced the answer
    pub generation: Uuid,
}

/// Outcome of a single query
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Answer(MatchedAnswer),
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    /// Answer text, if any
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(matched) => Some(&matched.answer),
            Self::NoMatch => None,
        }
    }

    /// User-facing reply: the answer or `fallback`
    pub fn into_reply(self, fallback: &str) -> String {
        match self {
            Self::Answer(matched) => matched.answer,
            Self::NoMatch => fallback.to_string(),
        }
    }
}

/// Matching engine over the active generation
pub struct MatchEngine {
    active: Arc<ActiveIndex>,
    engine: Arc<VectorEngine>,
    config: MatchConfig,
}

impl MatchEngine {
    /// Create a new match engine
    ///
    /// # Errors
    /// Returns a config error for an invalid threshold or fallback message.
    pub fn new(
        active: Arc<ActiveIndex>,
        engine: Arc<VectorEngine>,
        config: MatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            active,
            engine,
            config,
        })
    }

    /// Answer `query`, or `NoMatch` when there is no confident answer or anything fails
    pub fn match_query(&self, query: &str) -> MatchResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_match(query))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                log::warn!("Match failed, answering NoMatch: {}", e);
                MatchResult::NoMatch
            }
            Err(_) => {
                log::error!("Match panicked, answering NoMatch");
                MatchResult::NoMatch
            }
        }
    }

    /// Answer `query` as a user-facing string
    pub fn reply(&self, query: &str) -> String {
        self.match_query(query)
            .into_reply(&self.config.fallback_message)
    }

    fn try_match(&self, query: &str) -> Result<MatchResult> {
        // Pin the generation before anything else so a concurrent swap
        // cannot change which index answers this query.
        let generation = match self.active.load() {
            Some(generation) => generation,
            None => {
                log::debug!("No active generation");
                return Ok(MatchResult::NoMatch);
            }
        };

        if query.trim().is_empty() {
            return Ok(MatchResult::NoMatch);
        }

        let vector = self.engine.embed_query(query)?;
        let index = generation.index();
        let neighbor = index.nearest(&vector)?;

        let entry = match index.entry(neighbor.position) {
            Some(entry) => entry,
            None => return Ok(MatchResult::NoMatch),
        };
        if !neighbor.distance.is_finite() || neighbor.distance > self.config.distance_threshold {
            log::debug!(
                "Nearest distance {} above threshold {}",
                neighbor.distance,
                self.config.distance_threshold
            );
            return Ok(MatchResult::NoMatch);
        }

        Ok(MatchResult::Answer(MatchedAnswer {
            answer: entry.answer.clone(),
            question: entry.question.clone(),
            distance: neighbor.distance,
            generation: generation.id(),
        }))
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn fallback_message(&self) -> &str {
        &self.config.fallback_message
    }

    pub fn active(&self) -> &Arc<ActiveIndex> {
        &self.active
    }
}
