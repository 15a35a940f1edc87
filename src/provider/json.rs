//! JSON file snapshot provider.
//!
//! Reads a single JSON document of the form
//!
//! ```json
//! {
//!   "vectors": [[0.1, 0.2], [0.3, 0.4]],
//!   "papers": [
//!     {"title": "...", "abstract_url": "...", "pdf_url": "...", "abstract_freq": {"term": 2}}
//!   ],
//!   "cluster_ids": [0, 1]
//! }
//! ```
//!
//! `cluster_ids` and each paper's `abstract_freq` may be omitted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, ProviderResult, SnapshotProvider};
use crate::models::{EmbeddingMatrix, IndexSnapshot, PaperInfo, TermFrequencies};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    vectors: Vec<Vec<f32>>,
    papers: Vec<PaperEntry>,
    #[serde(default)]
    cluster_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
struct PaperEntry {
    title: String,
    #[serde(default)]
    abstract_url: String,
    #[serde(default)]
    pdf_url: String,
    #[serde(default)]
    abstract_freq: TermFrequencies,
}

/// Snapshot provider backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
    name: String,
}

impl JsonFileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("JSON file {}", path.display());
        Self { path, name }
    }

    /// Parse a snapshot document.
    ///
    /// # Errors
    /// Returns `ProviderError::ParseError` for malformed JSON and
    /// `ProviderError::InvalidData` for embedding rows of unequal length
    pub fn parse(content: &str) -> ProviderResult<IndexSnapshot> {
        let file: SnapshotFile =
            serde_json::from_str(content).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let vectors = EmbeddingMatrix::from_rows(file.vectors)?;
        let papers = file
            .papers
            .into_iter()
            .map(|entry| {
                PaperInfo::new(
                    entry.title,
                    entry.abstract_url,
                    entry.pdf_url,
                    entry.abstract_freq,
                )
            })
            .collect();

        Ok(IndexSnapshot {
            vectors,
            papers,
            cluster_ids: file.cluster_ids,
        })
    }
}

#[async_trait]
impl SnapshotProvider for JsonFileProvider {
    async fn fetch_snapshot(&self) -> ProviderResult<IndexSnapshot> {
        debug!("Reading snapshot from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await?;
        Self::parse(&content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
