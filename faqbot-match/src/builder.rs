//! Index rebuild and publication
//!
//! A rebuild embeds the corpus, builds a fresh [`Generation`], optionally
//! persists it, then swaps it into the [`ActiveIndex`]. Any failure leaves the
//! serving generation untouched. Only one rebuild runs at a time; a second
//! caller fails fast with `RebuildInProgress`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::corpus::{CorpusSource, FaqEntry};
use crate::embedding::VectorEngine;
use crate::error::{ErrorKind, MatchError};
use crate::generation::{ActiveIndex, Generation};
use crate::index::{EmbeddedRecord, VectorIndex};
use crate::snapshot::SnapshotStore;

/// Step of the rebuild that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStage {
    Acquire,
    Fetch,
    Validate,
    Embed,
    Index,
    Persist,
}

impl fmt::Display for RebuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acquire => "acquire",
            Self::Fetch => "fetch",
            Self::Validate => "validate",
            Self::Embed => "embed",
            Self::Index => "index",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// A rebuild that did not publish anything
#[derive(Debug, Error)]
#[error("Rebuild failed during {stage}: {source}")]
pub struct RebuildFailure {
    pub stage: RebuildStage,
    pub source: MatchError,
}

impl RebuildFailure {
    fn new(stage: RebuildStage, source: MatchError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Outcome of a successful rebuild
#[derive(Debug, Clone)]
pub struct RebuildSummary {
    pub record_count: usize,
    pub build_duration: Duration,
    pub generation: Uuid,
    pub built_at: DateTime<Utc>,
    pub dimension: usize,
}

/// How the active generation was obtained at startup
#[derive(Debug, Clone)]
pub enum Bootstrap {
    /// Restored from the snapshot directory
    Loaded { generation: Uuid, record_count: usize },
    /// Built from the corpus source
    Rebuilt(RebuildSummary),
    /// Corpus was empty; nothing is served
    Empty,
}

/// Builds generations and publishes them
pub struct IndexBuilder {
    engine: Arc<VectorEngine>,
    active: Arc<ActiveIndex>,
    snapshots: Option<SnapshotStore>,
    batch_size: usize,
    rebuild_lock: Mutex<()>,
}

impl IndexBuilder {
    pub fn new(engine: Arc<VectorEngine>, active: Arc<ActiveIndex>, config: &MatchConfig) -> Self {
        Self {
            engine,
            active,
            snapshots: None,
            batch_size: config.embed_batch_size.max(1),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Persist every published generation to `store`
    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    /// Rebuild from `corpus` and publish the result
    pub fn rebuild(&self, corpus: &[FaqEntry]) -> Result<RebuildSummary, RebuildFailure> {
        let _guard = self.rebuild_lock.try_lock().ok_or_else(|| {
            RebuildFailure::new(RebuildStage::Acquire, MatchError::RebuildInProgress)
        })?;
        self.rebuild_locked(corpus)
    }

    /// Fetch the latest corpus snapshot and rebuild from it
    pub fn rebuild_from(&self, source: &dyn CorpusSource) -> Result<RebuildSummary, RebuildFailure> {
        let _guard = self.rebuild_lock.try_lock().ok_or_else(|| {
            RebuildFailure::new(RebuildStage::Acquire, MatchError::RebuildInProgress)
        })?;
        log::info!("Fetching corpus from {}", source.describe());
        let corpus = source
            .fetch_all()
            .map_err(|e| RebuildFailure::new(RebuildStage::Fetch, e))?;
        self.rebuild_locked(&corpus)
    }

    fn rebuild_locked(&self, corpus: &[FaqEntry]) -> Result<RebuildSummary, RebuildFailure> {
        let started = Instant::now();

        if corpus.is_empty() {
            log::warn!("Refusing to rebuild from an empty corpus");
            return Err(RebuildFailure::new(
                RebuildStage::Validate,
                MatchError::EmptyCorpus,
            ));
        }
        log::info!("Rebuilding index from {} entries", corpus.len());

        let questions: Vec<&str> = corpus.iter().map(|e| e.question.as_str()).collect();
        let vectors = self
            .engine
            .embed_corpus(&questions, self.batch_size)
            .map_err(|e| RebuildFailure::new(RebuildStage::Embed, e))?;

        let records: Vec<EmbeddedRecord> = corpus
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(entry, vector)| EmbeddedRecord::new(entry, vector))
            .collect();
        let index =
            VectorIndex::build(records).map_err(|e| RebuildFailure::new(RebuildStage::Index, e))?;
        let generation = Generation::new(index, self.engine.model_name());

        if let Some(store) = &self.snapshots {
            store
                .save(&generation)
                .map_err(|e| RebuildFailure::new(RebuildStage::Persist, e))?;
        }

        let summary = RebuildSummary {
            record_count: generation.index().size(),
            build_duration: started.elapsed(),
            generation: generation.id(),
            built_at: generation.built_at(),
            dimension: generation.index().dimension(),
        };
        self.active.publish(Arc::new(generation));
        self.engine.retain_corpus(&questions);

        log::info!(
            "Rebuild complete: {} records in {:?} (generation {})",
            summary.record_count,
            summary.build_duration,
            summary.generation
        );
        Ok(summary)
    }

    /// Bring up the first generation at process start
    ///
    /// Loads a compatible snapshot when one exists; otherwise builds from
    /// `source`. An empty corpus leaves the handle empty rather than failing.
    pub fn bootstrap(&self, source: &dyn CorpusSource) -> Result<Bootstrap, RebuildFailure> {
        if let Some(store) = &self.snapshots {
            match store.load() {
                Ok(Some(generation)) => {
                    if self.is_compatible(&generation) {
                        let loaded = Bootstrap::Loaded {
                            generation: generation.id(),
                            record_count: generation.index().size(),
                        };
                        self.active.publish(Arc::new(generation));
                        return Ok(loaded);
                    }
                    log::warn!(
                        "Snapshot built with {} ({}d) does not match {} ({}d); rebuilding",
                        generation.model(),
                        generation.index().dimension(),
                        self.engine.model_name(),
                        self.engine.dimension()
                    );
                }
                Ok(None) => {}
                Err(e) => log::warn!("Ignoring unreadable snapshot: {}", e),
            }
        }

        match self.rebuild_from(source) {
            Ok(summary) => Ok(Bootstrap::Rebuilt(summary)),
            Err(failure) if failure.kind() == ErrorKind::EmptyCorpus => {
                log::warn!("Corpus is empty; serving fallback replies until retrained");
                Ok(Bootstrap::Empty)
            }
            Err(failure) => Err(failure),
        }
    }

    fn is_compatible(&self, generation: &Generation) -> bool {
        generation.model() == self.engine.model_name()
            && generation.index().dimension() == self.engine.dimension()
    }

    pub fn active(&self) -> &Arc<ActiveIndex> {
        &self.active
    }

    pub fn engine(&self) -> &Arc<VectorEngine> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::StaticCorpus;
    use crate::embedding::HashingEmbedder;
    use crate::matcher::{MatchEngine, MatchResult};
    use crate::testing::{GatedEmbedder, TableEmbedder};
    use std::thread;

    fn table() -> TableEmbedder {
        TableEmbedder::new(2)
            .with("q1", vec![1.0, 0.0])
            .with("q2", vec![0.0, 1.0])
            .with("q3", vec![1.0, 1.0])
            .with("bad", vec![1.0, 2.0, 3.0])
    }

    fn builder_with(table: TableEmbedder) -> IndexBuilder {
        let engine = Arc::new(VectorEngine::new(Arc::new(table), 16));
        IndexBuilder::new(engine, Arc::new(ActiveIndex::new()), &MatchConfig::default())
    }

    fn corpus(questions: &[&str]) -> Vec<FaqEntry> {
        questions
            .iter()
            .map(|q| FaqEntry::new(*q, format!("answer to {}", q)))
            .collect()
    }

    #[test]
    fn test_rebuild_publishes_generation() {
        let builder = builder_with(table());
        let summary = builder.rebuild(&corpus(&["q1", "q2"])).unwrap();
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.dimension, 2);

        let active = builder.active().load().unwrap();
        assert_eq!(active.id(), summary.generation);
        assert_eq!(active.model(), "table");
        assert_eq!(active.index().entry(1).unwrap().answer, "answer to q2");
    }

    #[test]
    fn test_empty_corpus_keeps_previous_generation() {
        let builder = builder_with(table());
        let first = builder.rebuild(&corpus(&["q1"])).unwrap();

        let failure = builder.rebuild(&[]).unwrap_err();
        assert_eq!(failure.stage, RebuildStage::Validate);
        assert!(matches!(failure.source, MatchError::EmptyCorpus));
        assert_eq!(builder.active().load().unwrap().id(), first.generation);
    }

    #[test]
    fn test_embedding_failure_keeps_previous_generation() {
        let builder = builder_with(table());
        let first = builder.rebuild(&corpus(&["q1"])).unwrap();

        let failure = builder.rebuild(&corpus(&["q2", "missing"])).unwrap_err();
        assert_eq!(failure.stage, RebuildStage::Embed);
        assert_eq!(failure.kind(), ErrorKind::EmbeddingFailure);
        assert_eq!(builder.active().load().unwrap().id(), first.generation);
    }

    #[test]
    fn test_dimension_mismatch_aborts() {
        let builder = builder_with(table());
        let failure = builder.rebuild(&corpus(&["q1", "bad"])).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::DimensionMismatch);
        assert!(builder.active().load().is_none());
    }

    #[test]
    fn test_same_corpus_gives_new_identity() {
        let builder = builder_with(table());
        let a = builder.rebuild(&corpus(&["q1", "q2"])).unwrap();
        let b = builder.rebuild(&corpus(&["q1", "q2"])).unwrap();
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    fn test_rebuild_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        let summary = builder.rebuild(&corpus(&["q1", "q2", "q3"])).unwrap();

        let loaded = SnapshotStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(loaded.id(), summary.generation);
        assert_eq!(loaded.index().size(), 3);
    }

    #[test]
    fn test_persist_failure_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the snapshot directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let builder = builder_with(table()).with_snapshots(SnapshotStore::new(&blocker));

        let failure = builder.rebuild(&corpus(&["q1"])).unwrap_err();
        assert_eq!(failure.stage, RebuildStage::Persist);
        assert!(builder.active().load().is_none());
    }

    #[test]
    fn test_concurrent_rebuild_fails_fast() {
        let (gated, gate) = GatedEmbedder::new(table(), "q3");
        let engine = Arc::new(VectorEngine::new(Arc::new(gated), 16));
        let builder = Arc::new(IndexBuilder::new(
            engine,
            Arc::new(ActiveIndex::new()),
            &MatchConfig::default(),
        ));

        let first = {
            let builder = Arc::clone(&builder);
            thread::spawn(move || builder.rebuild(&corpus(&["q1", "q3"])))
        };
        gate.entered.recv().unwrap();

        let second = builder.rebuild(&corpus(&["q1"])).unwrap_err();
        assert_eq!(second.stage, RebuildStage::Acquire);
        assert_eq!(second.kind(), ErrorKind::RebuildInProgress);

        gate.release.send(()).unwrap();
        let summary = first.join().unwrap().unwrap();
        assert_eq!(summary.record_count, 2);
    }

    #[test]
    fn test_bootstrap_rebuilds_without_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        let source = StaticCorpus::new(corpus(&["q1", "q2"]));

        assert!(matches!(
            builder.bootstrap(&source).unwrap(),
            Bootstrap::Rebuilt(_)
        ));
        assert!(builder.active().is_loaded());
    }

    #[test]
    fn test_bootstrap_prefers_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let first = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        let summary = first.rebuild(&corpus(&["q1", "q2"])).unwrap();

        let builder = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        // A source that would fail proves the snapshot path was taken
        let source = StaticCorpus::new(corpus(&["missing"]));
        match builder.bootstrap(&source).unwrap() {
            Bootstrap::Loaded {
                generation,
                record_count,
            } => {
                assert_eq!(generation, summary.generation);
                assert_eq!(record_count, 2);
            }
            other => panic!("expected snapshot load, got {:?}", other),
        }
    }

    #[test]
    fn test_bootstrap_rebuilds_on_model_change() {
        let dir = tempfile::tempdir().unwrap();
        let first = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        first.rebuild(&corpus(&["q1", "q2"])).unwrap();

        let wider = TableEmbedder::new(3).with("q1", vec![1.0, 0.0, 0.0]);
        let builder = builder_with(wider).with_snapshots(SnapshotStore::new(dir.path()));
        let source = StaticCorpus::new(corpus(&["q1"]));
        assert!(matches!(
            builder.bootstrap(&source).unwrap(),
            Bootstrap::Rebuilt(_)
        ));
        assert_eq!(builder.active().load().unwrap().index().dimension(), 3);
    }

    #[test]
    fn test_bootstrap_empty_corpus() {
        let builder = builder_with(table());
        let source = StaticCorpus::new(vec![]);
        assert!(matches!(builder.bootstrap(&source).unwrap(), Bootstrap::Empty));
        assert!(!builder.active().is_loaded());
    }

    fn campus_table() -> TableEmbedder {
        TableEmbedder::new(3)
            .with("What are the library hours?", vec![1.0, 0.0, 0.0])
            .with("How do I apply for a scholarship?", vec![0.0, 1.0, 0.0])
            .with("When does the library open?", vec![0.8, 0.1, 0.0])
            .with("What's the weather on Mars?", vec![0.0, 0.0, 2.0])
            .with("Where do I park?", vec![0.0, 0.0, 1.0])
    }

    #[test]
    fn test_rebuild_then_match() {
        let engine = Arc::new(VectorEngine::new(Arc::new(campus_table()), 16));
        let active = Arc::new(ActiveIndex::new());
        let builder = IndexBuilder::new(engine.clone(), active.clone(), &MatchConfig::default());
        let matcher = MatchEngine::new(active, engine, MatchConfig::default()).unwrap();

        builder
            .rebuild(&[
                FaqEntry::new("What are the library hours?", "9am-9pm"),
                FaqEntry::new(
                    "How do I apply for a scholarship?",
                    "Visit the financial aid office",
                ),
            ])
            .unwrap();

        assert_eq!(
            matcher.match_query("When does the library open?").answer(),
            Some("9am-9pm")
        );
        // Both questions sit at distance 5.0
        assert_eq!(
            matcher.match_query("What's the weather on Mars?"),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_swap_does_not_disturb_in_flight_query() {
        let (gated, gate) = GatedEmbedder::new(campus_table(), "When does the library open?");
        let engine = Arc::new(VectorEngine::new(Arc::new(gated), 16));
        let active = Arc::new(ActiveIndex::new());
        let builder = IndexBuilder::new(engine.clone(), active.clone(), &MatchConfig::default());
        let matcher = Arc::new(MatchEngine::new(active, engine, MatchConfig::default()).unwrap());

        let first = builder
            .rebuild(&[FaqEntry::new("What are the library hours?", "old hours")])
            .unwrap();

        let in_flight = {
            let matcher = Arc::clone(&matcher);
            thread::spawn(move || matcher.match_query("When does the library open?"))
        };
        gate.entered.recv().unwrap();

        let second = builder
            .rebuild(&[
                FaqEntry::new("What are the library hours?", "new hours"),
                FaqEntry::new("Where do I park?", "Lot C"),
            ])
            .unwrap();
        gate.release.send(()).unwrap();

        match in_flight.join().unwrap() {
            MatchResult::Answer(m) => {
                assert_eq!(m.answer, "old hours");
                assert_eq!(m.generation, first.generation);
            }
            MatchResult::NoMatch => panic!("in-flight query lost its generation"),
        }

        // Query vector is cached now, so the gate is not hit again
        match matcher.match_query("When does the library open?") {
            MatchResult::Answer(m) => {
                assert_eq!(m.answer, "new hours");
                assert_eq!(m.generation, second.generation);
            }
            MatchResult::NoMatch => panic!("expected a match from the new generation"),
        }
    }

    #[test]
    fn test_campus_scenario_with_default_embedder() {
        let engine = Arc::new(VectorEngine::new(Arc::new(HashingEmbedder::default()), 16));
        let active = Arc::new(ActiveIndex::new());
        let builder = IndexBuilder::new(engine.clone(), active.clone(), &MatchConfig::default());
        let matcher = MatchEngine::new(active, engine, MatchConfig::default()).unwrap();

        builder
            .rebuild(&[
                FaqEntry::new("What are the library hours?", "9am-9pm"),
                FaqEntry::new(
                    "How do I apply for a scholarship?",
                    "Visit the financial aid office",
                ),
            ])
            .unwrap();

        assert_eq!(
            matcher.match_query("When is the library open?").answer(),
            Some("9am-9pm")
        );
        assert_eq!(
            matcher.match_query("What is the weather today?"),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_bootstrap_after_interrupted_persist_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let first = builder_with(table()).with_snapshots(SnapshotStore::new(dir.path()));
        first
            .rebuild(&[FaqEntry::new("q1", "A1"), FaqEntry::new("q2", "A2")])
            .unwrap();

        // Occupy the records temp path so the save stops after the vectors
        let blocker = dir.path().join("faq_data.tmp");
        std::fs::create_dir(&blocker).unwrap();
        let reordered = [FaqEntry::new("q2", "B2"), FaqEntry::new("q1", "B1")];
        let failure = first.rebuild(&reordered).unwrap_err();
        assert_eq!(failure.stage, RebuildStage::Persist);
        std::fs::remove_dir(&blocker).unwrap();

        let engine = Arc::new(VectorEngine::new(Arc::new(table()), 16));
        let active = Arc::new(ActiveIndex::new());
        let builder = IndexBuilder::new(engine.clone(), active.clone(), &MatchConfig::default())
            .with_snapshots(SnapshotStore::new(dir.path()));
        let source = StaticCorpus::new(reordered.to_vec());
        assert!(matches!(
            builder.bootstrap(&source).unwrap(),
            Bootstrap::Rebuilt(_)
        ));

        let matcher = MatchEngine::new(active, engine, MatchConfig::default()).unwrap();
        assert_eq!(matcher.match_query("q1").answer(), Some("B1"));
        assert_eq!(matcher.match_query("q2").answer(), Some("B2"));
    }
}
