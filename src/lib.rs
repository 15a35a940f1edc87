//! Paper Vec Search - a query engine over a fixed collection of papers.
//!
//! Every paper carries a dense embedding produced by an offline training
//! pipeline plus a small amount of metadata: its title, links, and the term
//! counts of its abstract. The index answers three kinds of queries over
//! that collection.
//!
//! # Architecture
//!
//! - **models**: Core data structures (PaperRecord, EmbeddingMatrix, results)
//! - **index**: The immutable in-memory `PaperIndex` and its load/save lifecycle
//! - **query**: Top-k selection and the similarity, title and keyword queries
//! - **storage**: Persistence of index artifacts (SQLite-based)
//! - **provider**: Reading exported snapshots (JSON) for import
//!
//! # Workflow
//!
//! ## Import
//!
//! 1. Read vectors, paper metadata and cluster ids exported by the trainer
//! 2. Load them into a `PaperIndex`, truncating mismatched counts
//! 3. Save the artifacts into the SQLite store
//!
//! ## Search
//!
//! 1. Load the artifacts from the store and build the index once
//! 2. Answer queries:
//!    - similar papers by mean squared embedding distance
//!    - first paper whose title contains a string
//!    - papers that match every keyword, ranked by term frequency
//!
//! # Example
//!
//! ```ignore
//! use paper_vec_search::{
//!     storage::{sqlite::SqliteStorage, PaperStorage},
//!     PaperIndex,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut storage = SqliteStorage::new("papers.db");
//!     storage.initialize().await?;
//!     let index = PaperIndex::load(storage.load_index(false).await?);
//!
//!     if let Some(paper_id) = index.find_by_title("light field") {
//!         for hit in index.find_similar(paper_id, 5)? {
//!             println!("{:.4} {}", hit.distance, index.paper(hit.paper_id).unwrap().title());
//!         }
//!     }
//!
//!     for hit in index.find_by_keywords(["depth", "stereo"], 10)? {
//!         println!("{} {}", hit.score, index.paper(hit.paper_id).unwrap().title());
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod index;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;

// Re-export commonly used types at the crate root
pub use index::PaperIndex;
pub use models::{
    EmbeddingMatrix, IndexSnapshot, KeywordMatch, PaperInfo, PaperRecord, SimilarPaper,
    TermFrequencies,
};
pub use query::{select_top_k, QueryError, SortOrder};
pub use storage::PaperStorage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of neighbours returned by a similarity query
pub const DEFAULT_SIMILAR_COUNT: usize = 5;
