//! Snapshot provider module.
//!
//! This module defines the interface for sourcing the artifacts of an index
//! (embeddings, paper metadata, cluster labels) from outside the crate,
//! typically the output of the offline training pipeline.
//!
//! The `SnapshotProvider` trait abstracts the source, so the import binary
//! works with any exported format without coupling to it.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{IndexSnapshot, ModelError};

pub mod json;

/// Errors that can occur when reading a snapshot from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The data parsed but does not form a valid snapshot
    #[error("Invalid snapshot: {0}")]
    InvalidData(#[from] ModelError),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing index snapshots.
///
/// Providers return the artifacts as found. Mismatched vector and paper
/// counts are not an error here; the index truncates when it is loaded.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Read the full snapshot.
    ///
    /// # Errors
    /// Returns `ProviderError` if the source cannot be read or parsed
    async fn fetch_snapshot(&self) -> ProviderResult<IndexSnapshot>;

    /// Get a human-readable name/description of this provider.
    ///
    /// This is useful for logging and debugging.
    fn name(&self) -> &str;
}
