//! Question/answer corpus sources
//!
//! The engine never owns FAQ persistence; it only reads snapshots.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MatchError, Result};

/// One curated question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Read-only provider of the current question/answer set
pub trait CorpusSource: Send + Sync {
    /// Fetch a full snapshot, in a stable order
    fn fetch_all(&self) -> Result<Vec<FaqEntry>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Fixed in-memory corpus
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    entries: Vec<FaqEntry>,
}

impl StaticCorpus {
    pub fn new(entries: Vec<FaqEntry>) -> Self {
        Self { entries }
    }
}

impl CorpusSource for StaticCorpus {
    fn fetch_all(&self) -> Result<Vec<FaqEntry>> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("static corpus ({} entries)", self.entries.len())
    }
}

/// On-disk layouts accepted by [`JsonFileCorpus`]
#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    /// `[{"question": .., "answer": ..}, ..]`
    Entries(Vec<FaqEntry>),
    /// `{"questions": [..], "answers": [..]}`
    Columns {
        questions: Vec<String>,
        answers: Vec<String>,
    },
}

/// Corpus read from a JSON file on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileCorpus {
    path: PathBuf,
}

impl JsonFileCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorpusSource for JsonFileCorpus {
    fn fetch_all(&self) -> Result<Vec<FaqEntry>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            MatchError::corpus(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        match serde_json::from_slice::<CorpusFile>(&bytes)? {
            CorpusFile::Entries(entries) => Ok(entries),
            CorpusFile::Columns { questions, answers } => {
                if questions.len() != answers.len() {
                    return Err(MatchError::CorpusIndexMismatch {
                        records: answers.len(),
                        rows: questions.len(),
                    });
                }
                Ok(questions
                    .into_iter()
                    .zip(answers)
                    .map(|(question, answer)| FaqEntry { question, answer })
                    .collect())
            }
        }
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
