//! Exploration of cluster labels assigned upstream and of abstract terms.

use std::collections::BTreeMap;

use tracing::debug;

use super::rank::{select_top_k, SortOrder};
use crate::index::PaperIndex;

impl PaperIndex {
    /// Ids of the papers labelled `cluster_id`, in index order.
    ///
    /// Empty when no cluster ids were loaded.
    pub fn papers_in_cluster(&self, cluster_id: i32) -> Vec<usize> {
        (0..self.len())
            .filter(|&paper_id| self.cluster_id(paper_id) == Some(cluster_id))
            .collect()
    }

    /// Most frequent abstract terms across the papers of a cluster.
    ///
    /// Term counts are summed over every paper in the cluster. Terms with the
    /// same total are listed alphabetically.
    pub fn cluster_keywords(&self, cluster_id: i32, count: usize) -> Vec<(String, u32)> {
        let mut totals: BTreeMap<&str, u32> = BTreeMap::new();
        for paper_id in self.papers_in_cluster(cluster_id) {
            let Some(record) = self.paper(paper_id) else {
                continue;
            };
            for (term, &occurrences) in &record.abstract_freq {
                let total = totals.entry(term.as_str()).or_insert(0);
                *total = total.saturating_add(occurrences);
            }
        }

        let keywords = rank_terms(totals, count);
        debug!(cluster_id, found = keywords.len(), "Cluster keyword summary");
        keywords
    }

    /// Most frequent abstract terms of a single paper, ties alphabetical.
    ///
    /// Empty when `paper_id` is not a loaded paper.
    pub fn paper_keywords(&self, paper_id: usize, count: usize) -> Vec<(String, u32)> {
        match self.paper(paper_id) {
            Some(record) => rank_terms(
                record
                    .abstract_freq
                    .iter()
                    .map(|(term, &occurrences)| (term.as_str(), occurrences))
                    .collect(),
                count,
            ),
            None => Vec::new(),
        }
    }
}

/// Top `count` terms by occurrences; the map order breaks ties.
fn rank_terms(totals: BTreeMap<&str, u32>, count: usize) -> Vec<(String, u32)> {
    let (terms, counts): (Vec<&str>, Vec<u32>) = totals.into_iter().unzip();
    select_top_k(&counts, count, SortOrder::Descending)
        .into_iter()
        .map(|i| (terms[i].to_string(), counts[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::index::PaperIndex;
    use crate::models::{EmbeddingMatrix, PaperRecord, TermFrequencies};

    fn clustered_index() -> PaperIndex {
        let papers = [
            ("A", vec![("depth", 3), ("stereo", 1)], 0),
            ("B", vec![("gan", 2)], 1),
            ("C", vec![("depth", 1), ("light", 4)], 0),
            ("D", vec![("gan", 5), ("depth", 1)], 1),
        ];
        let vectors =
            EmbeddingMatrix::from_rows(papers.iter().enumerate().map(|(i, _)| vec![i as f32]))
                .unwrap();
        let records = papers
            .iter()
            .map(|(title, terms, _)| {
                let freq: TermFrequencies =
                    terms.iter().map(|(t, c)| (t.to_string(), *c)).collect();
                PaperRecord::new(*title, "", "", freq)
            })
            .collect();
        let cluster_ids = papers.iter().map(|(_, _, cluster)| *cluster).collect();
        PaperIndex::new(vectors, records, Some(cluster_ids))
    }

    #[test]
    fn test_papers_in_cluster() {
        let index = clustered_index();
        assert_eq!(index.papers_in_cluster(0), vec![0, 2]);
        assert_eq!(index.papers_in_cluster(1), vec![1, 3]);
        assert!(index.papers_in_cluster(7).is_empty());
    }

    #[test]
    fn test_cluster_keywords_sums_frequencies() {
        let index = clustered_index();
        assert_eq!(
            index.cluster_keywords(0, 2),
            vec![("depth".to_string(), 4), ("light".to_string(), 4)]
        );
        assert_eq!(
            index.cluster_keywords(1, 10),
            vec![("gan".to_string(), 7), ("depth".to_string(), 1)]
        );
    }

    #[test]
    fn test_paper_keywords() {
        let index = clustered_index();
        assert_eq!(
            index.paper_keywords(2, 5),
            vec![("light".to_string(), 4), ("depth".to_string(), 1)]
        );
        assert_eq!(index.paper_keywords(3, 1), vec![("gan".to_string(), 5)]);
        assert!(index.paper_keywords(9, 5).is_empty());
    }

    #[test]
    fn test_no_clusters_loaded() {
        let vectors = EmbeddingMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let records = vec![PaperRecord::new("A", "", "", TermFrequencies::new())];
        let index = PaperIndex::new(vectors, records, None);
        assert!(index.papers_in_cluster(0).is_empty());
        assert!(index.cluster_keywords(0, 5).is_empty());
    }
}
