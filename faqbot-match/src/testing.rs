//! Fixture embedding providers for unit tests

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::embedding::EmbeddingProvider;
use crate::error::{MatchError, Result};

/// Returns fixed vectors for known strings and fails on anything else
#[derive(Debug, Default)]
pub struct TableEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    /// Number of texts embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for TableEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| MatchError::embedding(format!("no fixture for {:?}", text)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

/// Always panics, standing in for a crashing model runtime
pub struct PanickingEmbedder {
    dimension: usize,
}

impl PanickingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for PanickingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        panic!("model runtime crashed")
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "panicking"
    }
}

/// Wraps a [`TableEmbedder`] and parks callers embedding `gated_text`
///
/// Each time the gated text is embedded the provider sends on `entered` and
/// then blocks until the test sends on the release channel.
pub struct GatedEmbedder {
    inner: TableEmbedder,
    gated_text: String,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// Test-side ends of a [`GatedEmbedder`]
pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedEmbedder {
    pub fn new(inner: TableEmbedder, gated_text: &str) -> (Self, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let embedder = Self {
            inner,
            gated_text: gated_text.to_string(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (
            embedder,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl EmbeddingProvider for GatedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text == self.gated_text {
            let _ = self.entered.lock().send(());
            let _ = self.release.lock().recv();
        }
        self.inner.embed(text)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
