//! Core data models for the paper index.
//!
//! This module contains the data structures shared by the index, the query
//! operations and the storage layer: the decoded paper record, its stored
//! form, the embedding matrix and the result types returned by queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling model values.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// An embedding row does not have the dimension of the first row
    #[error("Embedding row {row} has {found} dimensions, expected {expected}")]
    RaggedEmbeddings {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Mapping from lowercase abstract term to its occurrence count.
pub type TermFrequencies = BTreeMap<String, u32>;

/// Decode stored title bytes, dropping any invalid UTF-8 sequences.
pub fn decode_title(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Paper metadata as it is persisted.
///
/// The title is kept as raw bytes; it is only decoded when the paper is
/// turned into a [`PaperRecord`] at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperInfo {
    /// Undecoded title bytes
    pub title: Vec<u8>,

    /// Link to the abstract page
    pub abstract_url: String,

    /// Link to the PDF
    pub pdf_url: String,

    /// Term counts of the abstract
    pub abstract_freq: TermFrequencies,
}

impl PaperInfo {
    pub fn new(
        title: impl Into<Vec<u8>>,
        abstract_url: impl Into<String>,
        pdf_url: impl Into<String>,
        abstract_freq: TermFrequencies,
    ) -> Self {
        Self {
            title: title.into(),
            abstract_url: abstract_url.into(),
            pdf_url: pdf_url.into(),
            abstract_freq,
        }
    }
}

/// A loaded paper.
///
/// `title_for_search` is derived from `title` on construction and is always
/// its lowercase form, which is why both are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PaperRecordFields", into = "PaperRecordFields")]
pub struct PaperRecord {
    title: String,
    title_for_search: String,

    /// Link to the abstract page
    pub abstract_url: String,

    /// Link to the PDF
    pub pdf_url: String,

    /// Term counts of the abstract, keyed by lowercase term
    pub abstract_freq: TermFrequencies,
}

impl PaperRecord {
    pub fn new(
        title: impl Into<String>,
        abstract_url: impl Into<String>,
        pdf_url: impl Into<String>,
        abstract_freq: TermFrequencies,
    ) -> Self {
        let title = title.into();
        let title_for_search = title.to_lowercase();
        Self {
            title,
            title_for_search,
            abstract_url: abstract_url.into(),
            pdf_url: pdf_url.into(),
            abstract_freq,
        }
    }

    /// Decode a stored paper. Invalid title bytes are dropped.
    pub fn from_info(info: PaperInfo) -> Self {
        Self::new(
            decode_title(&info.title),
            info.abstract_url,
            info.pdf_url,
            info.abstract_freq,
        )
    }

    /// The stored form of this record.
    pub fn to_info(&self) -> PaperInfo {
        PaperInfo::new(
            self.title.as_bytes(),
            self.abstract_url.as_str(),
            self.pdf_url.as_str(),
            self.abstract_freq.clone(),
        )
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Lowercase title used by title and keyword queries.
    pub fn title_for_search(&self) -> &str {
        &self.title_for_search
    }

    /// Occurrences of `term` in the abstract; zero when absent.
    pub fn term_frequency(&self, term: &str) -> u32 {
        self.abstract_freq.get(term).copied().unwrap_or(0)
    }
}

/// Serialized shape of [`PaperRecord`]; the search title is rebuilt on read.
#[derive(Serialize, Deserialize)]
struct PaperRecordFields {
    title: String,
    abstract_url: String,
    pdf_url: String,
    #[serde(default)]
    abstract_freq: TermFrequencies,
}

impl From<PaperRecordFields> for PaperRecord {
    fn from(fields: PaperRecordFields) -> Self {
        Self::new(
            fields.title,
            fields.abstract_url,
            fields.pdf_url,
            fields.abstract_freq,
        )
    }
}

impl From<PaperRecord> for PaperRecordFields {
    fn from(record: PaperRecord) -> Self {
        Self {
            title: record.title,
            abstract_url: record.abstract_url,
            pdf_url: record.pdf_url,
            abstract_freq: record.abstract_freq,
        }
    }
}

/// Dense row-major matrix of paper embeddings, shape `(rows, dimension)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build a matrix from individual rows.
    ///
    /// The first row fixes the dimension; every other row must match it.
    ///
    /// # Errors
    /// Returns `ModelError::RaggedEmbeddings` for the first row of a
    /// different length
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> ModelResult<Self>
    where
        R: AsRef<[f32]>,
    {
        let mut matrix = Self::default();
        for (index, row) in rows.into_iter().enumerate() {
            let row = row.as_ref();
            if index == 0 {
                matrix.dimension = row.len();
            } else if row.len() != matrix.dimension {
                return Err(ModelError::RaggedEmbeddings {
                    row: index,
                    expected: matrix.dimension,
                    found: row.len(),
                });
            }
            matrix.data.extend_from_slice(row);
            matrix.rows += 1;
        }
        Ok(matrix)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).filter_map(move |index| self.row(index))
    }
}

/// Everything persisted for an index: the three artifacts saved and loaded
/// together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    /// Paper embeddings, row `i` belonging to `papers[i]`
    pub vectors: EmbeddingMatrix,

    /// Stored paper metadata
    pub papers: Vec<PaperInfo>,

    /// Cluster label per paper, when clustering was run upstream
    pub cluster_ids: Option<Vec<i32>>,
}

/// A neighbour returned by a similarity query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarPaper {
    pub paper_id: usize,

    /// Mean squared difference to the query paper's embedding
    pub distance: f64,
}

/// A paper returned by a keyword query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub paper_id: usize,

    /// Summed term frequencies plus whole-word title hits
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freq(pairs: &[(&str, u32)]) -> TermFrequencies {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn test_title_for_search_is_lowercase() {
        let record = PaperRecord::new("Deep Learning Survey", "", "", TermFrequencies::new());
        assert_eq!(record.title(), "Deep Learning Survey");
        assert_eq!(record.title_for_search(), "deep learning survey");
    }

    #[test]
    fn test_decode_title_drops_invalid_bytes() {
        let bytes = b"Caf\xc3\xa9 \xff\xfeNets";
        assert_eq!(decode_title(bytes), "Café Nets");
        assert_eq!(decode_title(b"\x80"), "");
    }

    #[test]
    fn test_record_from_info_decodes_title() {
        let info = PaperInfo::new(
            b"Light \xffField".to_vec(),
            "abs/1",
            "pdf/1",
            freq(&[("light", 2)]),
        );
        let record = PaperRecord::from_info(info);
        assert_eq!(record.title(), "Light Field");
        assert_eq!(record.title_for_search(), "light field");
        assert_eq!(record.term_frequency("light"), 2);
        assert_eq!(record.term_frequency("field"), 0);
    }

    #[test]
    fn test_record_info_round_trip_keeps_metadata() {
        let record = PaperRecord::new("GAN Paper", "a", "p", freq(&[("gan", 3)]));
        let info = record.to_info();
        assert_eq!(info.title, b"GAN Paper".to_vec());
        assert_eq!(PaperRecord::from_info(info), record);
    }

    #[test]
    fn test_record_deserialize_rebuilds_search_title() {
        let json = r#"{"title":"Neural RADIANCE","abstract_url":"a","pdf_url":"p"}"#;
        let record: PaperRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title_for_search(), "neural radiance");
        assert!(record.abstract_freq.is_empty());

        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("title_for_search").is_none());
    }

    #[test]
    fn test_matrix_from_rows() {
        let matrix = EmbeddingMatrix::from_rows(vec![vec![0.0, 1.0], vec![2.0, 3.0]]).unwrap();
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.dimension(), 2);
        assert_eq!(matrix.row(1), Some(&[2.0, 3.0][..]));
        assert_eq!(matrix.row(2), None);
        assert_eq!(matrix.iter_rows().count(), 2);
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let err = EmbeddingMatrix::from_rows(vec![vec![0.0, 1.0], vec![2.0]]).unwrap_err();
        assert_eq!(
            err,
            ModelError::RaggedEmbeddings {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = EmbeddingMatrix::from_rows(Vec::<Vec<f32>>::new()).unwrap();
        assert_eq!(matrix.rows(), 0);
        assert_eq!(matrix.dimension(), 0);
        assert_eq!(matrix.row(0), None);
    }
}
