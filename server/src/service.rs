//! FAQ service
//!
//! Owns the match engine and index builder and moves their blocking work
//! off the async runtime.

use faqbot_match::{
    ActiveIndex, Bootstrap, CorpusSource, EmbeddingProvider, HashingEmbedder, IndexBuilder,
    JsonFileCorpus, MatchConfig, MatchEngine, MatchResult, RebuildSummary, SnapshotStatus,
    SnapshotStore, VectorEngine, DEFAULT_HASHING_DIMENSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ServerError, ServerResult};
use crate::rpc::protocol::HealthResult;

/// Default corpus file inside the data directory
pub const DEFAULT_CORPUS_FILE: &str = "faqs.json";

/// Embedding backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbedderKind {
    /// Feature-hashing embedder, no model files
    Hashing,
    /// all-MiniLM-L6-v2 through fastembed
    Fastembed,
}

/// Everything needed to assemble a [`FaqService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub corpus_path: Option<PathBuf>,
    pub embedder: EmbedderKind,
    pub dimension: usize,
    pub query_timeout: Duration,
    pub matching: MatchConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            corpus_path: None,
            embedder: EmbedderKind::Hashing,
            dimension: DEFAULT_HASHING_DIMENSION,
            query_timeout: Duration::from_millis(5000),
            matching: MatchConfig::default(),
        }
    }
}

impl ServiceConfig {
    fn corpus_path(&self) -> PathBuf {
        self.corpus_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_CORPUS_FILE))
    }

    fn provider(&self) -> ServerResult<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(self.dimension)?)),
            #[cfg(feature = "fastembed")]
            EmbedderKind::Fastembed => Ok(Arc::new(faqbot_match::FastEmbedProvider::new(
                &self.data_dir.join("models"),
            )?)),
            #[cfg(not(feature = "fastembed"))]
            EmbedderKind::Fastembed => Err(ServerError::Config(
                "built without the fastembed feature".to_string(),
            )),
        }
    }
}

/// Answer for one question
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub answer: String,
    pub matched: bool,
}

/// Matching plus administration
pub struct FaqService {
    matcher: Arc<MatchEngine>,
    builder: Arc<IndexBuilder>,
    corpus: Arc<dyn CorpusSource>,
    query_timeout: Duration,
}

impl FaqService {
    pub fn new(
        matcher: Arc<MatchEngine>,
        builder: Arc<IndexBuilder>,
        corpus: Arc<dyn CorpusSource>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            matcher,
            builder,
            corpus,
            query_timeout,
        }
    }

    /// Assemble the service from configuration; nothing is indexed yet
    pub fn from_config(config: &ServiceConfig) -> ServerResult<Self> {
        let engine = Arc::new(VectorEngine::new(
            config.provider()?,
            config.matching.query_cache_capacity,
        ));
        let active = Arc::new(ActiveIndex::new());

        let matcher = MatchEngine::new(active.clone(), engine.clone(), config.matching.clone())?;
        let builder = IndexBuilder::new(engine, active, &config.matching)
            .with_snapshots(SnapshotStore::new(&config.data_dir));
        let corpus = JsonFileCorpus::new(config.corpus_path());

        tracing::info!(
            "Service configured: corpus {}, data dir {:?}",
            corpus.describe(),
            config.data_dir
        );

        Ok(Self::new(
            Arc::new(matcher),
            Arc::new(builder),
            Arc::new(corpus),
            config.query_timeout,
        ))
    }

    /// Load the persisted snapshot or build from the corpus
    pub async fn bootstrap(&self) -> ServerResult<Bootstrap> {
        let builder = Arc::clone(&self.builder);
        let corpus = Arc::clone(&self.corpus);
        let outcome = tokio::task::spawn_blocking(move || builder.bootstrap(corpus.as_ref()))
            .await
            .map_err(|e| ServerError::Task(e.to_string()))??;

        match &outcome {
            Bootstrap::Loaded {
                generation,
                record_count,
            } => tracing::info!(
                "Loaded snapshot generation {} with {} FAQs",
                generation,
                record_count
            ),
            Bootstrap::Rebuilt(summary) => tracing::info!(
                "Built generation {} with {} FAQs",
                summary.generation,
                summary.record_count
            ),
            Bootstrap::Empty => tracing::warn!("No FAQs indexed"),
        }
        Ok(outcome)
    }

    /// Answer `question`; failures and timeouts yield the fallback message
    pub async fn ask(&self, question: &str) -> Reply {
        let matcher = Arc::clone(&self.matcher);
        let owned = question.to_string();
        let task = tokio::task::spawn_blocking(move || matcher.match_query(&owned));

        let result = match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Match task failed: {}", e);
                MatchResult::NoMatch
            }
            Err(_) => {
                tracing::warn!("Match timed out after {:?}", self.query_timeout);
                MatchResult::NoMatch
            }
        };

        let matched = result.is_match();
        Reply {
            answer: result.into_reply(self.matcher.fallback_message()),
            matched,
        }
    }

    /// Rebuild from the corpus source and publish the new generation
    pub async fn retrain(&self) -> ServerResult<RebuildSummary> {
        let builder = Arc::clone(&self.builder);
        let corpus = Arc::clone(&self.corpus);
        let summary = tokio::task::spawn_blocking(move || builder.rebuild_from(corpus.as_ref()))
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?
            .map_err(|failure| {
                tracing::warn!("Retrain failed: {}", failure);
                failure
            })?;
        Ok(summary)
    }

    /// On-disk snapshot status, `None` when persistence is off
    pub fn snapshot_status(&self) -> Option<SnapshotStatus> {
        self.builder.snapshots().map(SnapshotStore::status)
    }

    pub fn health(&self) -> HealthResult {
        let model = self.builder.engine().model_name().to_string();
        match self.builder.active().load() {
            Some(generation) => HealthResult {
                status: "ok".to_string(),
                generation: Some(generation.id().to_string()),
                built_at: Some(generation.built_at().to_rfc3339()),
                record_count: generation.index().size(),
                dimension: generation.index().dimension(),
                model: generation.model().to_string(),
            },
            None => HealthResult {
                status: "empty".to_string(),
                generation: None,
                built_at: None,
                record_count: 0,
                dimension: self.builder.engine().dimension(),
                model,
            },
        }
    }
}
