//! Query processing and ranking module.
//!
//! This module implements the read-only queries over a loaded
//! [`PaperIndex`]:
//!
//! - [`PaperIndex::find_similar`]: nearest papers by embedding distance
//! - [`PaperIndex::find_by_title`]: first paper whose title contains a string
//! - [`PaperIndex::find_by_keywords`]: papers ranked by keyword relevance
//! - [`PaperIndex::papers_in_cluster`] and [`PaperIndex::cluster_keywords`]
//!   for exploring upstream cluster labels
//!
//! All rankings go through [`select_top_k`].
//!
//! # Usage
//!
//! ```rust
//! use paper_vec_search::models::{EmbeddingMatrix, PaperRecord, TermFrequencies};
//! use paper_vec_search::PaperIndex;
//!
//! let vectors = EmbeddingMatrix::from_rows(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]])?;
//! let records = ["A", "B", "C"]
//!     .iter()
//!     .map(|t| PaperRecord::new(*t, "", "", TermFrequencies::new()))
//!     .collect();
//! let index = PaperIndex::new(vectors, records, None);
//!
//! let similar = index.find_similar(0, 2)?;
//! assert_eq!(similar[0].paper_id, 1);
//! assert_eq!(similar[0].distance, 0.5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cluster;
pub mod matcher;
pub mod rank;

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

pub use matcher::WordMatcher;
pub use rank::{select_top_k, SortOrder};

use crate::index::PaperIndex;
use crate::models::{KeywordMatch, SimilarPaper};

/// Errors that can occur during query processing.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// Paper id outside the loaded collection
    #[error("Paper id {paper_id} out of range (index holds {papers} papers)")]
    OutOfRange { paper_id: usize, papers: usize },

    /// Invalid query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Mean of squared elementwise differences between two embeddings.
///
/// Returns 0 for empty vectors.
pub fn mean_squared_error(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have the same length");
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();
    sum / a.len() as f64
}

impl PaperIndex {
    /// Find the papers closest to `paper_id` by mean squared embedding
    /// distance.
    ///
    /// The query paper itself is skipped, and the list stops at the first
    /// candidate with zero distance, so exact duplicates of the query paper
    /// never show up either.
    ///
    /// # Returns
    /// Up to `count` neighbours in ascending distance order
    ///
    /// # Errors
    /// Returns `QueryError::OutOfRange` if `paper_id` is not a loaded paper
    pub fn find_similar(&self, paper_id: usize, count: usize) -> QueryResult<Vec<SimilarPaper>> {
        let target = self.vector(paper_id).ok_or(QueryError::OutOfRange {
            paper_id,
            papers: self.len(),
        })?;

        let scores: Vec<f64> = self
            .vectors()
            .map(|row| mean_squared_error(row, target))
            .collect();

        // The closest entry is the query paper (or an earlier exact duplicate).
        let ranked = select_top_k(&scores, count.saturating_add(1), SortOrder::Ascending);
        let results: Vec<SimilarPaper> = ranked
            .into_iter()
            .skip(1)
            .map(|id| SimilarPaper {
                paper_id: id,
                distance: scores[id],
            })
            // NaN distances are not "<= 0" and stay in the list.
            .take_while(|hit| !(hit.distance <= 0.0))
            .collect();

        debug!(paper_id, count, found = results.len(), "Similarity query");
        Ok(results)
    }

    /// Find the first paper whose title contains `title`, ignoring case.
    ///
    /// Papers are scanned in index order, so the earliest match wins even if
    /// a later title matches more closely.
    pub fn find_by_title(&self, title: &str) -> Option<usize> {
        let needle = title.to_lowercase();
        let found = self
            .records()
            .iter()
            .position(|record| record.title_for_search().contains(&needle));

        debug!(query = title, ?found, "Title query");
        found
    }

    /// Rank papers that match every keyword.
    ///
    /// Each keyword is lowercased and scores its abstract term frequency plus
    /// one if it appears as a whole word in the title. A paper where any
    /// keyword scores zero is excluded; otherwise its score is the sum over
    /// all keywords.
    ///
    /// # Arguments
    /// * `keywords` - Keyword set; repeated keywords count once
    /// * `count` - Maximum number of results, or 0 for all but one paper
    ///
    /// # Returns
    /// Up to `count` matches in descending score order. An empty keyword set
    /// gives an empty list.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidQuery` if a keyword cannot be compiled
    /// into a matcher
    pub fn find_by_keywords<I, S>(&self, keywords: I, count: usize) -> QueryResult<Vec<KeywordMatch>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: BTreeSet<String> = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().to_string())
            .collect();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let count = if count == 0 {
            self.len().saturating_sub(1)
        } else {
            count
        };

        let terms = keywords
            .iter()
            .map(|keyword| {
                let term = keyword.to_lowercase();
                let matcher = WordMatcher::new(&term)?;
                Ok((term, matcher))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let scores: Vec<u32> = self
            .records()
            .iter()
            .map(|record| {
                let mut total = 0u32;
                for (term, matcher) in &terms {
                    let mut keyword_score = record.term_frequency(term);
                    if matcher.is_match(record.title_for_search()) {
                        keyword_score = keyword_score.saturating_add(1);
                    }
                    if keyword_score == 0 {
                        return 0;
                    }
                    total = total.saturating_add(keyword_score);
                }
                total
            })
            .collect();

        let results: Vec<KeywordMatch> = select_top_k(&scores, count, SortOrder::Descending)
            .into_iter()
            .map(|id| KeywordMatch {
                paper_id: id,
                score: scores[id],
            })
            .take_while(|hit| hit.score > 0)
            .collect();

        debug!(?keywords, count, found = results.len(), "Keyword query");
        Ok(results)
    }
}
