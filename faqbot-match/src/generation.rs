//! Index generations and the active-generation handle
//!
//! A generation is never mutated after construction. Rebuilds publish a new
//! one with a single pointer swap; readers that loaded the old `Arc` keep it
//! alive until they return.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::index::VectorIndex;

/// One immutable, fully built index snapshot
#[derive(Debug)]
pub struct Generation {
    id: Uuid,
    built_at: DateTime<Utc>,
    model: String,
    index: VectorIndex,
}

impl Generation {
    /// Wrap a freshly built index with a new identity
    pub fn new(index: VectorIndex, model: impl Into<String>) -> Self {
        Self::with_identity(Uuid::new_v4(), Utc::now(), index, model)
    }

    /// Restore a generation with a known identity (snapshot reload)
    pub fn with_identity(
        id: Uuid,
        built_at: DateTime<Utc>,
        index: VectorIndex,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            built_at,
            model: model.into(),
            index,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Embedding model the vectors came from
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Process-wide reference to the serving generation
///
/// Loads are wait-free and never contend with a rebuild; `publish` is a
/// single atomic store.
#[derive(Debug, Default)]
pub struct ActiveIndex {
    current: ArcSwapOption<Generation>,
}

impl ActiveIndex {
    /// Create an empty handle (every query answers `NoMatch`)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generation(generation: Generation) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(generation),
        }
    }

    /// Take a reference to the generation serving right now
    pub fn load(&self) -> Option<Arc<Generation>> {
        self.current.load_full()
    }

    /// Make `generation` active, returning the retired one
    pub fn publish(&self, generation: Arc<Generation>) -> Option<Arc<Generation>> {
        let new_id = generation.id();
        let retired = self.current.swap(Some(generation));
        match &retired {
            Some(old) => log::info!("Published generation {} (retired {})", new_id, old.id()),
            None => log::info!("Published generation {}", new_id),
        }
        retired
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }
}
