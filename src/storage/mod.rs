//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving the
//! artifacts an index is built from: the embedding matrix, the paper
//! metadata and the optional cluster labels. The three are written and read
//! as a unit ([`IndexSnapshot`]) but kept as separate artifacts, so a store
//! may hand back a different number of vectors and papers; the index copes
//! with that at load time.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{IndexSnapshot, ModelError};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<ModelError> for StorageError {
    fn from(err: ModelError) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for index storage backends.
///
/// Implementations persist the artifacts of a [`crate::PaperIndex`]
/// verbatim; they do not interpret titles, vectors or cluster labels.
#[async_trait]
pub trait PaperStorage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.).
    ///
    /// This should be idempotent and safe to call multiple times.
    ///
    /// # Errors
    /// Returns `StorageError` if initialization fails
    async fn initialize(&mut self) -> StorageResult<()>;

    /// Replace the stored artifacts with `snapshot`.
    ///
    /// When the snapshot has no cluster ids, previously stored ones are
    /// removed as well.
    ///
    /// # Errors
    /// Returns `StorageError` if any artifact cannot be written; nothing is
    /// replaced in that case
    async fn save_index(&mut self, snapshot: &IndexSnapshot) -> StorageResult<()>;

    /// Read the stored artifacts.
    ///
    /// # Arguments
    /// * `load_cluster_ids` - Also read cluster labels; when `false` the
    ///   snapshot's `cluster_ids` is `None`
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if nothing has been saved yet, or
    /// other `StorageError` variants when reading fails
    async fn load_index(&self, load_cluster_ids: bool) -> StorageResult<IndexSnapshot>;

    /// Number of stored paper metadata entries.
    ///
    /// # Errors
    /// Returns `StorageError` if the count fails
    async fn count_papers(&self) -> StorageResult<usize>;
}
