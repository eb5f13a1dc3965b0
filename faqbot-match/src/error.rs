//! Error types for faqbot-match

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur in the matching engine
#[derive(Debug, Error)]
pub enum MatchError {
    /// Refused to build an index over zero records
    #[error("Corpus is empty")]
    EmptyCorpus,

    /// Vector length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    EmbeddingFailure(String),

    /// Persisted metadata and vector rows disagree
    #[error("Corpus/index mismatch: {records} records but {rows} vector rows")]
    CorpusIndexMismatch { records: usize, rows: usize },

    /// Another rebuild holds the build lock
    #[error("Rebuild already in progress")]
    RebuildInProgress,

    /// Model loading error
    #[error("Model error: {0}")]
    Model(String),

    /// Corpus source could not produce a snapshot
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Snapshot files are present but unreadable
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Rejected configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of a [`MatchError`] for administrative callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyCorpus,
    DimensionMismatch,
    EmbeddingFailure,
    CorpusIndexMismatch,
    RebuildInProgress,
    Storage,
    Other,
}

impl MatchError {
    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailure(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a corpus error
    pub fn corpus(msg: impl Into<String>) -> Self {
        Self::Corpus(msg.into())
    }

    /// Create an invalid snapshot error
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCorpus => ErrorKind::EmptyCorpus,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::EmbeddingFailure(_) | Self::Model(_) => ErrorKind::EmbeddingFailure,
            Self::CorpusIndexMismatch { .. } => ErrorKind::CorpusIndexMismatch,
            Self::RebuildInProgress => ErrorKind::RebuildInProgress,
            Self::InvalidSnapshot(_) | Self::Bincode(_) | Self::Json(_) | Self::Io(_) => {
                ErrorKind::Storage
            }
            Self::Corpus(_) | Self::Config(_) => ErrorKind::Other,
        }
    }
}

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchError>;
