//! Exact nearest-neighbour index
//!
//! Linear scan over a flat row-major vector buffer, O(n * d) per query.

use crate::corpus::FaqEntry;
use crate::error::{MatchError, Result};

/// A question/answer pair with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRecord {
    pub question: String,
    pub answer: String,
    pub vector: Vec<f32>,
}

impl EmbeddedRecord {
    pub fn new(entry: FaqEntry, vector: Vec<f32>) -> Self {
        Self {
            question: entry.question,
            answer: entry.answer,
            vector,
        }
    }
}

/// Result of a nearest-neighbour lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row position in the index
    pub position: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Immutable vector index over one corpus snapshot
///
/// Row `i` of the vector buffer belongs to `entries[i]`; position is the
/// only link between a vector and its text.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<FaqEntry>,
    vectors: Vec<f32>,
    dimension: usize,
}

impl VectorIndex {
    /// Build an index over `records`, keeping their order
    ///
    /// # Errors
    /// `EmptyCorpus` for no records, `DimensionMismatch` if vector lengths differ.
    pub fn build(records: Vec<EmbeddedRecord>) -> Result<Self> {
        let dimension = match records.first() {
            Some(first) => first.vector.len(),
            None => return Err(MatchError::EmptyCorpus),
        };
        if dimension == 0 {
            return Err(MatchError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(MatchError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        let mut vectors = Vec::with_capacity(records.len() * dimension);
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            vectors.extend_from_slice(&record.vector);
            entries.push(FaqEntry {
                question: record.question,
                answer: record.answer,
            });
        }

        Ok(Self {
            entries,
            vectors,
            dimension,
        })
    }

    /// Reassemble an index from a flat vector buffer and its metadata rows
    ///
    /// # Errors
    /// `CorpusIndexMismatch` when the row count differs from the entry count.
    pub fn from_parts(entries: Vec<FaqEntry>, vectors: Vec<f32>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MatchError::invalid_snapshot("zero vector dimension"));
        }
        if vectors.len() % dimension != 0 {
            return Err(MatchError::invalid_snapshot(format!(
                "{} values do not form rows of {}",
                vectors.len(),
                dimension
            )));
        }
        let rows = vectors.len() / dimension;
        if rows != entries.len() {
            return Err(MatchError::CorpusIndexMismatch {
                records: entries.len(),
                rows,
            });
        }
        if entries.is_empty() {
            return Err(MatchError::EmptyCorpus);
        }

        Ok(Self {
            entries,
            vectors,
            dimension,
        })
    }

    /// Find the closest stored vector
    ///
    /// Ties resolve to the smallest position.
    pub fn nearest(&self, query: &[f32]) -> Result<Neighbor> {
        if query.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut best = Neighbor {
            position: 0,
            distance: f32::INFINITY,
        };
        for (position, row) in self.vectors.chunks_exact(self.dimension).enumerate() {
            let distance = squared_euclidean(query, row);
            if distance < best.distance {
                best = Neighbor { position, distance };
            }
        }
        Ok(best)
    }

    /// Get the entry at a position
    pub fn entry(&self, position: usize) -> Option<&FaqEntry> {
        self.entries.get(position)
    }

    /// Get the stored vector at a position
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    /// Flat row-major vector buffer
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Squared Euclidean distance (no sqrt; ordering is the same)
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
