//! FAQ Match Engine
//!
//! Semantic matching of free-text questions against a curated FAQ corpus.
//!
//! ## Features
//!
//! - **Exact nearest neighbour** - linear scan over squared Euclidean distance
//! - **Confidence threshold** - queries farther than the threshold get `NoMatch`
//! - **Atomic rebuilds** - a new generation is published with one pointer swap
//! - **Snapshots** - vectors and metadata persisted as a reloadable pair
//!
//! ## Example
//!
//! ```ignore
//! use faqbot_match::{
//!     ActiveIndex, FaqEntry, HashingEmbedder, IndexBuilder, MatchConfig, MatchEngine,
//!     VectorEngine,
//! };
//!
//! let config = MatchConfig::default();
//! let engine = Arc::new(VectorEngine::new(Arc::new(HashingEmbedder::default()), 1024));
//! let active = Arc::new(ActiveIndex::new());
//!
//! let builder = IndexBuilder::new(engine.clone(), active.clone(), &config);
//! builder.rebuild(&[FaqEntry::new("What are the library hours?", "9am-9pm")])?;
//!
//! let matcher = MatchEngine::new(active, engine, config)?;
//! println!("{}", matcher.reply("When does the library open?"));
//! ```

pub mod builder;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod matcher;
pub mod snapshot;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use builder::{Bootstrap, IndexBuilder, RebuildFailure, RebuildStage, RebuildSummary};
pub use config::{MatchConfig, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_FALLBACK_MESSAGE};
pub use corpus::{CorpusSource, FaqEntry, JsonFileCorpus, StaticCorpus};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedProvider;
pub use embedding::{EmbeddingProvider, HashingEmbedder, VectorEngine, DEFAULT_HASHING_DIMENSION};
pub use error::{ErrorKind, MatchError, Result};
pub use generation::{ActiveIndex, Generation};
pub use index::{EmbeddedRecord, Neighbor, VectorIndex};
pub use matcher::{MatchEngine, MatchResult, MatchedAnswer};
pub use snapshot::{SnapshotManifest, SnapshotStatus, SnapshotStore};
