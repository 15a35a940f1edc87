//! In-memory paper index.
//!
//! The index is built once from an [`IndexSnapshot`] and never mutated
//! afterwards. Query operations live in [`crate::query`] and only read from
//! it, so a loaded index can be shared between threads freely.
//!
//! # Partial loads
//!
//! Records and embedding rows are paired by position. When a snapshot holds
//! a different number of each, only the common prefix is queryable: the
//! index truncates to the smaller count and logs a warning instead of
//! failing. The full artifacts are still kept so that [`PaperIndex::save`]
//! writes back exactly what was loaded.

use tracing::{info, warn};

use crate::models::{EmbeddingMatrix, IndexSnapshot, PaperInfo, PaperRecord};

/// Loaded papers, their embeddings and optional cluster labels.
#[derive(Debug, Clone, Default)]
pub struct PaperIndex {
    records: Vec<PaperRecord>,
    vectors: EmbeddingMatrix,
    cluster_ids: Option<Vec<i32>>,

    /// Number of usable papers: `min(records.len(), vectors.rows())`
    papers: usize,
}

impl PaperIndex {
    /// Build an index from decoded records.
    pub fn new(
        vectors: EmbeddingMatrix,
        records: Vec<PaperRecord>,
        cluster_ids: Option<Vec<i32>>,
    ) -> Self {
        let papers = records.len().min(vectors.rows());

        if records.len() != vectors.rows() {
            warn!(
                records = records.len(),
                vectors = vectors.rows(),
                "Paper record and vector counts differ, truncating index to {} papers",
                papers
            );
        }

        if let Some(ids) = &cluster_ids {
            if ids.len() != papers {
                warn!(
                    cluster_ids = ids.len(),
                    papers, "Cluster id count does not match paper count"
                );
            }
        }

        info!("Loaded {} papers info.", papers);

        Self {
            records,
            vectors,
            cluster_ids,
            papers,
        }
    }

    /// Load an index from its persisted artifacts, decoding every title.
    pub fn load(snapshot: IndexSnapshot) -> Self {
        let records = snapshot
            .papers
            .into_iter()
            .map(PaperRecord::from_info)
            .collect();
        Self::new(snapshot.vectors, records, snapshot.cluster_ids)
    }

    /// The artifacts to persist, exactly as they were loaded.
    pub fn save(&self) -> IndexSnapshot {
        let papers: Vec<PaperInfo> = self.records.iter().map(PaperRecord::to_info).collect();
        info!("Saved {} papers info.", self.papers);
        IndexSnapshot {
            vectors: self.vectors.clone(),
            papers,
            cluster_ids: self.cluster_ids.clone(),
        }
    }

    /// Number of queryable papers.
    pub fn len(&self) -> usize {
        self.papers
    }

    pub fn is_empty(&self) -> bool {
        self.papers == 0
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    /// Record of a queryable paper.
    pub fn paper(&self, paper_id: usize) -> Option<&PaperRecord> {
        if paper_id < self.papers {
            self.records.get(paper_id)
        } else {
            None
        }
    }

    /// Embedding of a queryable paper.
    pub fn vector(&self, paper_id: usize) -> Option<&[f32]> {
        if paper_id < self.papers {
            self.vectors.row(paper_id)
        } else {
            None
        }
    }

    /// Cluster label of a queryable paper, if clusters were loaded.
    pub fn cluster_id(&self, paper_id: usize) -> Option<i32> {
        if paper_id >= self.papers {
            return None;
        }
        self.cluster_ids.as_ref()?.get(paper_id).copied()
    }

    pub fn has_clusters(&self) -> bool {
        self.cluster_ids.is_some()
    }

    /// Queryable records in index order.
    pub(crate) fn records(&self) -> &[PaperRecord] {
        &self.records[..self.papers]
    }

    /// Queryable embedding rows in index order.
    pub(crate) fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.vectors.iter_rows().take(self.papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TermFrequencies;

    fn record(title: &str) -> PaperRecord {
        PaperRecord::new(title, "", "", TermFrequencies::new())
    }

    fn matrix(rows: &[&[f32]]) -> EmbeddingMatrix {
        EmbeddingMatrix::from_rows(rows.iter().copied()).unwrap()
    }

    #[test]
    fn test_count_is_aligned_length() {
        let index = PaperIndex::new(
            matrix(&[&[0.0], &[1.0]]),
            vec![record("A"), record("B")],
            None,
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 1);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_more_records_than_vectors_truncates() {
        let index = PaperIndex::new(
            matrix(&[&[0.0, 0.0]]),
            vec![record("A"), record("B"), record("C")],
            None,
        );
        assert_eq!(index.len(), 1);
        assert!(index.paper(1).is_none());
        assert_eq!(index.records().len(), 1);
    }

    #[test]
    fn test_more_vectors_than_records_truncates() {
        let index = PaperIndex::new(matrix(&[&[0.0], &[1.0], &[2.0]]), vec![record("A")], None);
        assert_eq!(index.len(), 1);
        assert!(index.vector(1).is_none());
        assert_eq!(index.vector(0), Some(&[0.0][..]));
        assert_eq!(index.vectors().collect::<Vec<_>>(), vec![&[0.0][..]]);
    }

    #[test]
    fn test_index_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PaperIndex>();
    }

    #[test]
    fn test_load_decodes_titles() {
        let snapshot = IndexSnapshot {
            vectors: matrix(&[&[1.0]]),
            papers: vec![PaperInfo::new(
                b"Ro\xffbust Nets".to_vec(),
                "a",
                "p",
                TermFrequencies::new(),
            )],
            cluster_ids: None,
        };
        let index = PaperIndex::load(snapshot);
        assert_eq!(index.paper(0).unwrap().title(), "Robust Nets");
        assert_eq!(index.paper(0).unwrap().title_for_search(), "robust nets");
    }

    #[test]
    fn test_save_keeps_truncated_artifacts() {
        let index = PaperIndex::new(
            matrix(&[&[0.0], &[1.0], &[2.0]]),
            vec![record("A"), record("B")],
            Some(vec![0, 1, 1]),
        );
        let snapshot = index.save();
        assert_eq!(snapshot.vectors.rows(), 3);
        assert_eq!(snapshot.papers.len(), 2);
        assert_eq!(snapshot.cluster_ids, Some(vec![0, 1, 1]));
    }

    #[test]
    fn test_cluster_id_lookup() {
        let index = PaperIndex::new(
            matrix(&[&[0.0], &[1.0], &[2.0]]),
            vec![record("A"), record("B"), record("C")],
            Some(vec![4, 2]),
        );
        assert!(index.has_clusters());
        assert_eq!(index.cluster_id(0), Some(4));
        assert_eq!(index.cluster_id(1), Some(2));
        assert_eq!(index.cluster_id(2), None);
        assert_eq!(index.cluster_id(7), None);

        let plain = PaperIndex::new(matrix(&[&[0.0]]), vec![record("A")], None);
        assert_eq!(plain.cluster_id(0), None);
    }
}
