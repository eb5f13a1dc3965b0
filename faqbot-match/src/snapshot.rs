//! Persisted generation snapshots
//!
//! A snapshot directory holds three files:
//! - `faq_index.bin` - bincode vector blob (N x D row-major f32)
//! - `faq_data.json` - `{question, answer}` records in row order
//! - `faq_lookup.json` - manifest used for status reporting
//!
//! Each file is written to a temporary name and renamed into place. The blob
//! and the records both carry the generation id; a pair left behind by an
//! interrupted save disagrees on it and is refused at load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::corpus::FaqEntry;
use crate::error::{MatchError, Result};
use crate::generation::Generation;
use crate::index::VectorIndex;

const INDEX_FILE: &str = "faq_index.bin";
const DATA_FILE: &str = "faq_data.json";
const LOOKUP_FILE: &str = "faq_lookup.json";

/// Blob format version stored in `faq_index.bin`
const BLOB_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct VectorBlob {
    version: u32,
    generation: Uuid,
    built_at: DateTime<Utc>,
    model: String,
    rows: u64,
    dimension: u64,
    data: Vec<f32>,
}

/// Contents of `faq_data.json`
#[derive(Serialize, Deserialize)]
struct RecordFile {
    generation: Uuid,
    entries: Vec<FaqEntry>,
}

/// Manifest written next to the vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub total_faqs: usize,
    pub last_updated: DateTime<Utc>,
    pub generation: Uuid,
    pub model: String,
    pub dimension: usize,
}

/// What is on disk right now
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    pub index_exists: bool,
    pub lookup_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_faqs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_last_modified: Option<DateTime<Utc>>,
}

/// Snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    fn lookup_path(&self) -> PathBuf {
        self.dir.join(LOOKUP_FILE)
    }

    /// True when both the vector blob and the metadata are present
    pub fn exists(&self) -> bool {
        self.index_path().exists() && self.data_path().exists()
    }

    /// Write `generation` to disk
    pub fn save(&self, generation: &Generation) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let index = generation.index();

        let blob = VectorBlob {
            version: BLOB_VERSION,
            generation: generation.id(),
            built_at: generation.built_at(),
            model: generation.model().to_string(),
            rows: index.size() as u64,
            dimension: index.dimension() as u64,
            data: index.vectors().to_vec(),
        };
        write_atomic(&self.index_path(), &bincode::serialize(&blob)?)?;
        let records = RecordFile {
            generation: generation.id(),
            entries: index.entries().to_vec(),
        };
        write_atomic(&self.data_path(), &serde_json::to_vec_pretty(&records)?)?;

        let manifest = SnapshotManifest {
            total_faqs: index.size(),
            last_updated: generation.built_at(),
            generation: generation.id(),
            model: generation.model().to_string(),
            dimension: index.dimension(),
        };
        write_atomic(&self.lookup_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        log::info!(
            "Snapshot of generation {} saved to {}",
            generation.id(),
            self.dir.display()
        );
        Ok(())
    }

    /// Load the persisted generation, `None` when no snapshot exists
    ///
    /// # Errors
    /// `InvalidSnapshot` when the blob and the records come from different
    /// saves, `CorpusIndexMismatch` when their row counts disagree.
    pub fn load(&self) -> Result<Option<Generation>> {
        if !self.exists() {
            log::debug!("No snapshot found at {}", self.dir.display());
            return Ok(None);
        }

        let blob: VectorBlob = bincode::deserialize(&std::fs::read(self.index_path())?)?;
        if blob.version != BLOB_VERSION {
            return Err(MatchError::invalid_snapshot(format!(
                "Unsupported index version {} (expected {})",
                blob.version, BLOB_VERSION
            )));
        }
        let records: RecordFile = serde_json::from_slice(&std::fs::read(self.data_path())?)?;
        if records.generation != blob.generation {
            return Err(MatchError::invalid_snapshot(format!(
                "Vectors belong to generation {} but records to {}",
                blob.generation, records.generation
            )));
        }
        let entries = records.entries;

        let rows = blob.rows as usize;
        if entries.len() != rows {
            return Err(MatchError::CorpusIndexMismatch {
                records: entries.len(),
                rows,
            });
        }
        let expected = blob.rows.checked_mul(blob.dimension).ok_or_else(|| {
            MatchError::invalid_snapshot(format!(
                "Header size {}x{} overflows",
                blob.rows, blob.dimension
            ))
        })?;
        if blob.data.len() as u64 != expected {
            return Err(MatchError::invalid_snapshot(format!(
                "Header says {}x{} but blob holds {} values",
                blob.rows,
                blob.dimension,
                blob.data.len()
            )));
        }

        let index = VectorIndex::from_parts(entries, blob.data, blob.dimension as usize)?;
        let generation =
            Generation::with_identity(blob.generation, blob.built_at, index, blob.model);

        log::info!(
            "Loaded snapshot generation {} ({} records, {}d) from {}",
            generation.id(),
            generation.index().size(),
            generation.index().dimension(),
            self.dir.display()
        );
        Ok(Some(generation))
    }

    /// Read the manifest, if present
    pub fn manifest(&self) -> Result<Option<SnapshotManifest>> {
        let path = self.lookup_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&std::fs::read(path)?)?))
    }

    /// Describe the files currently on disk
    pub fn status(&self) -> SnapshotStatus {
        let index_path = self.index_path();
        let lookup_path = self.lookup_path();

        let manifest = match self.manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Unreadable snapshot manifest: {}", e);
                None
            }
        };
        let index_last_modified = std::fs::metadata(&index_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        SnapshotStatus {
            index_exists: index_path.exists(),
            lookup_exists: lookup_path.exists(),
            total_faqs: manifest.as_ref().map(|m| m.total_faqs),
            last_updated: manifest.as_ref().map(|m| m.last_updated),
            index_last_modified,
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
