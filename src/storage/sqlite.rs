//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `PaperStorage` trait.
//! It uses rusqlite for database access and stores embeddings as BLOBs.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{PaperStorage, StorageError, StorageResult};
use crate::models::{EmbeddingMatrix, IndexSnapshot, PaperInfo, TermFrequencies};

const CONFIG_DIMENSION: &str = "dimension";
const CONFIG_CLUSTERS: &str = "has_cluster_ids";

/// SQLite-based index storage.
///
/// # Schema
/// - `config`: (key TEXT PRIMARY KEY, value TEXT) holding the embedding
///   dimension and whether cluster ids were saved
/// - `paper_vectors`: (row_id INTEGER PRIMARY KEY, embedding BLOB) with
///   little-endian f32 components
/// - `paper_info`: (row_id INTEGER PRIMARY KEY, title BLOB, abstract_url TEXT,
///   pdf_url TEXT, abstract_freq TEXT) where `abstract_freq` is a JSON object
/// - `cluster_ids`: (row_id INTEGER PRIMARY KEY, cluster_id INTEGER)
///
/// Titles are stored as raw bytes and only decoded when an index is loaded.
pub struct SqliteStorage {
    /// Path to the SQLite database file, or `:memory:`
    db_path: String,

    connection: Option<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance.
    ///
    /// No file is touched until [`PaperStorage::initialize`] is called.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            connection: None,
        }
    }

    fn connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        let connection = self.connection.as_ref().ok_or_else(|| {
            StorageError::ConnectionError(format!(
                "storage at '{}' has not been initialized",
                self.db_path
            ))
        })?;
        connection
            .lock()
            .map_err(|_| StorageError::ConnectionError("connection lock poisoned".to_string()))
    }

    /// Create the database schema.
    ///
    /// # Errors
    /// Returns `StorageError::SchemaError` if schema creation fails
    fn create_schema(connection: &Connection) -> StorageResult<()> {
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS paper_vectors (
                    row_id INTEGER PRIMARY KEY,
                    embedding BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS paper_info (
                    row_id INTEGER PRIMARY KEY,
                    title BLOB NOT NULL,
                    abstract_url TEXT NOT NULL,
                    pdf_url TEXT NOT NULL,
                    abstract_freq TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS cluster_ids (
                    row_id INTEGER PRIMARY KEY,
                    cluster_id INTEGER NOT NULL
                );",
            )
            .map_err(|e| StorageError::SchemaError(e.to_string()))
    }

    /// Serialize an embedding vector to bytes for BLOB storage.
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
    }

    /// Deserialize an embedding vector from BLOB bytes.
    ///
    /// # Errors
    /// Returns `StorageError::SerializationError` if the byte length is not a
    /// multiple of four
    fn deserialize_embedding(bytes: &[u8]) -> StorageResult<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(StorageError::SerializationError(format!(
                "embedding blob of {} bytes is not a whole number of f32 values",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    fn get_config_value(connection: &Connection, key: &str) -> StorageResult<Option<String>> {
        Ok(connection
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn load_vectors(connection: &Connection, dimension: usize) -> StorageResult<EmbeddingMatrix> {
        let mut stmt = connection.prepare("SELECT row_id, embedding FROM paper_vectors ORDER BY row_id")?;
        let blobs = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(blobs.len());
        for (row_id, blob) in blobs {
            let embedding = Self::deserialize_embedding(&blob)?;
            if embedding.len() != dimension {
                return Err(StorageError::SerializationError(format!(
                    "embedding {} has {} dimensions, config says {}",
                    row_id,
                    embedding.len(),
                    dimension
                )));
            }
            rows.push(embedding);
        }
        Ok(EmbeddingMatrix::from_rows(rows)?)
    }

    fn load_papers(connection: &Connection) -> StorageResult<Vec<PaperInfo>> {
        let mut stmt = connection.prepare(
            "SELECT title, abstract_url, pdf_url, abstract_freq FROM paper_info ORDER BY row_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(title, abstract_url, pdf_url, freq_json)| -> StorageResult<PaperInfo> {
                let abstract_freq: TermFrequencies = serde_json::from_str(&freq_json)?;
                Ok(PaperInfo {
                    title,
                    abstract_url,
                    pdf_url,
                    abstract_freq,
                })
            })
            .collect()
    }

    fn load_cluster_ids(connection: &Connection) -> StorageResult<Vec<i32>> {
        let mut stmt = connection.prepare("SELECT cluster_id FROM cluster_ids ORDER BY row_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

#[async_trait]
impl PaperStorage for SqliteStorage {
    async fn initialize(&mut self) -> StorageResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        debug!("Opening SQLite database at {}", self.db_path);
        let connection = Connection::open(&self.db_path)
            .map_err(|e| StorageError::ConnectionError(format!("{}: {}", self.db_path, e)))?;
        Self::create_schema(&connection)?;
        self.connection = Some(Mutex::new(connection));
        Ok(())
    }

    async fn save_index(&mut self, snapshot: &IndexSnapshot) -> StorageResult<()> {
        let mut connection = self.connection()?;
        let tx = connection.transaction()?;

        tx.execute_batch(
            "DELETE FROM paper_vectors; DELETE FROM paper_info; DELETE FROM cluster_ids;",
        )?;

        {
            let mut insert = tx.prepare("INSERT INTO paper_vectors (row_id, embedding) VALUES (?1, ?2)")?;
            for (row_id, embedding) in snapshot.vectors.iter_rows().enumerate() {
                insert.execute(params![row_id as i64, Self::serialize_embedding(embedding)])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO paper_info (row_id, title, abstract_url, pdf_url, abstract_freq)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (row_id, paper) in snapshot.papers.iter().enumerate() {
                insert.execute(params![
                    row_id as i64,
                    paper.title,
                    paper.abstract_url,
                    paper.pdf_url,
                    serde_json::to_string(&paper.abstract_freq)?,
                ])?;
            }

            if let Some(cluster_ids) = &snapshot.cluster_ids {
                let mut insert = tx.prepare("INSERT INTO cluster_ids (row_id, cluster_id) VALUES (?1, ?2)")?;
                for (row_id, cluster_id) in cluster_ids.iter().enumerate() {
                    insert.execute(params![row_id as i64, cluster_id])?;
                }
            }
        }

        let upsert = "INSERT INTO config (key, value) VALUES (?1, ?2)
                      ON CONFLICT(key) DO UPDATE SET value = excluded.value";
        tx.execute(
            upsert,
            params![CONFIG_DIMENSION, snapshot.vectors.dimension().to_string()],
        )?;
        tx.execute(
            upsert,
            params![CONFIG_CLUSTERS, snapshot.cluster_ids.is_some().to_string()],
        )?;

        tx.commit()?;

        info!(
            vectors = snapshot.vectors.rows(),
            papers = snapshot.papers.len(),
            clusters = snapshot.cluster_ids.is_some(),
            "Saved index to {}",
            self.db_path
        );
        Ok(())
    }

    async fn load_index(&self, load_cluster_ids: bool) -> StorageResult<IndexSnapshot> {
        let connection = self.connection()?;

        let dimension = Self::get_config_value(&connection, CONFIG_DIMENSION)?
            .ok_or_else(|| {
                StorageError::NotFound(format!("no index has been saved to '{}'", self.db_path))
            })?
            .parse::<usize>()
            .map_err(|e| StorageError::SerializationError(format!("dimension: {}", e)))?;

        let vectors = Self::load_vectors(&connection, dimension)?;
        let papers = Self::load_papers(&connection)?;

        let has_clusters = Self::get_config_value(&connection, CONFIG_CLUSTERS)?
            .is_some_and(|value| value == "true");
        let cluster_ids = if load_cluster_ids && has_clusters {
            Some(Self::load_cluster_ids(&connection)?)
        } else {
            None
        };

        debug!(
            vectors = vectors.rows(),
            papers = papers.len(),
            "Loaded index artifacts from {}",
            self.db_path
        );

        Ok(IndexSnapshot {
            vectors,
            papers,
            cluster_ids,
        })
    }

    async fn count_papers(&self) -> StorageResult<usize> {
        let connection = self.connection()?;
        let count: i64 = connection.query_row("SELECT COUNT(*) FROM paper_info", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot() -> IndexSnapshot {
        let freq: TermFrequencies = [("depth".to_string(), 3), ("stereo".to_string(), 1)]
            .into_iter()
            .collect();
        IndexSnapshot {
            vectors: EmbeddingMatrix::from_rows(vec![vec![0.0, 1.5], vec![-2.0, 3.25]]).unwrap(),
            papers: vec![
                PaperInfo::new(b"Stereo \xffDepth".to_vec(), "abs/1", "pdf/1", freq),
                PaperInfo::new("Second", "abs/2", "pdf/2", TermFrequencies::new()),
            ],
            cluster_ids: Some(vec![3, 1]),
        }
    }

    async fn open_memory() -> SqliteStorage {
        let mut storage = SqliteStorage::new(":memory:");
        storage.initialize().await.unwrap();
        storage
    }

    #[test]
    fn test_embedding_serialization() {
        let embedding = vec![0.0, -1.5, 3.25, f32::MAX];
        let bytes = SqliteStorage::serialize_embedding(&embedding);
        assert_eq!(bytes.len(), 16);
        assert_eq!(SqliteStorage::deserialize_embedding(&bytes).unwrap(), embedding);
        assert!(SqliteStorage::deserialize_embedding(&bytes[..5]).is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_storage_errors() {
        let storage = SqliteStorage::new(":memory:");
        assert!(matches!(
            storage.count_papers().await,
            Err(StorageError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_load_before_save_is_not_found() {
        let storage = open_memory().await;
        assert!(matches!(
            storage.load_index(true).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load_preserves_artifacts() {
        let mut storage = open_memory().await;
        let snapshot = sample_snapshot();
        storage.save_index(&snapshot).await.unwrap();

        assert_eq!(storage.count_papers().await.unwrap(), 2);

        let loaded = storage.load_index(true).await.unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.papers[0].title, b"Stereo \xffDepth".to_vec());

        let without_clusters = storage.load_index(false).await.unwrap();
        assert_eq!(without_clusters.cluster_ids, None);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_index() {
        let mut storage = open_memory().await;
        storage.save_index(&sample_snapshot()).await.unwrap();

        let smaller = IndexSnapshot {
            vectors: EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap(),
            papers: vec![],
            cluster_ids: None,
        };
        storage.save_index(&smaller).await.unwrap();

        let loaded = storage.load_index(true).await.unwrap();
        assert_eq!(loaded.vectors.rows(), 1);
        assert_eq!(loaded.vectors.dimension(), 3);
        assert!(loaded.papers.is_empty());
        assert_eq!(loaded.cluster_ids, None);
        assert_eq!(storage.count_papers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_counts_survive_round_trip() {
        let mut storage = open_memory().await;
        let mut snapshot = sample_snapshot();
        snapshot.papers.pop();
        storage.save_index(&snapshot).await.unwrap();

        let loaded = storage.load_index(true).await.unwrap();
        assert_eq!(loaded.vectors.rows(), 2);
        assert_eq!(loaded.papers.len(), 1);
    }

    #[tokio::test]
    async fn test_file_database_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("papers.db");
        let path = path.to_string_lossy().to_string();

        let mut storage = SqliteStorage::new(path.clone());
        storage.initialize().await.unwrap();
        storage.initialize().await.unwrap();
        storage.save_index(&sample_snapshot()).await.unwrap();
        drop(storage);

        let mut reopened = SqliteStorage::new(path);
        reopened.initialize().await.unwrap();
        let loaded = reopened.load_index(true).await.unwrap();
        assert_eq!(loaded, sample_snapshot());
    }
}
