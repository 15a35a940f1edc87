//! Search binary entry point.
//!
//! This binary loads a paper index from the SQLite store and answers
//! similarity, title, keyword and cluster queries. It supports both
//! single-query and interactive REPL modes, with table or JSON output.
//!
//! # Examples
//!
//! Papers similar to paper 42:
//! ```bash
//! search --db-path papers.db --similar 42
//! ```
//!
//! Keyword search as JSON:
//! ```bash
//! search --db-path papers.db --keywords depth stereo --count 20 --format json
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --db-path papers.db --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use paper_vec_search::{
    storage::{sqlite::SqliteStorage, PaperStorage},
    PaperIndex, DEFAULT_SIMILAR_COUNT,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Number of terms listed for a cluster when no count is given
const DEFAULT_CLUSTER_KEYWORDS: usize = 15;

/// Number of abstract terms shown by `/detail`
const DETAIL_TERMS: usize = 10;

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Search binary CLI for querying the paper index
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Query the paper index by similarity, title or keywords",
    long_about = "Query the paper index. Find papers similar to a given paper, look a paper up \
                  by title, rank papers by keywords, or summarize a cluster.

EXAMPLES:
  Similar papers:
    search --db-path papers.db --similar 42

  Title lookup:
    search --db-path papers.db --title \"light field\"

  Keyword ranking as JSON:
    search --db-path papers.db --keywords depth stereo --format json

  Cluster summary:
    search --db-path papers.db --cluster 3

  Interactive mode:
    search --db-path papers.db --interactive"
)]
struct Args {
    /// Database file path
    #[arg(long, value_name = "PATH")]
    db_path: PathBuf,

    /// Find papers similar to this paper id
    #[arg(long, value_name = "ID", conflicts_with_all = ["title", "keywords", "cluster", "interactive"])]
    similar: Option<usize>,

    /// Find the first paper whose title contains this text
    #[arg(long, value_name = "TEXT", conflicts_with_all = ["keywords", "cluster", "interactive"])]
    title: Option<String>,

    /// Rank papers matching all of these keywords
    #[arg(long, value_name = "KEYWORD", num_args = 1.., conflicts_with_all = ["cluster", "interactive"])]
    keywords: Option<Vec<String>>,

    /// Summarize the papers of this cluster
    #[arg(long, value_name = "ID", conflicts_with = "interactive")]
    cluster: Option<i32>,

    /// Number of results (defaults: 5 similar papers, all keyword matches,
    /// 15 cluster terms)
    #[arg(long, value_name = "N")]
    count: Option<usize>,

    /// Load cluster ids alongside the index
    #[arg(long)]
    with_clusters: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// A query as entered on the command line or in the REPL
#[derive(Debug, Clone)]
enum Query {
    Similar(usize),
    Title(String),
    Keywords(Vec<String>),
    Cluster(i32),
}

/// One ranked paper, as printed
#[derive(Debug, Clone, Serialize)]
struct ResultRow {
    rank: usize,
    paper_id: usize,
    title: String,
    score: f64,
    abstract_url: String,
    pdf_url: String,
}

/// One summed abstract term of a cluster
#[derive(Debug, Clone, Serialize)]
struct TermCount {
    term: String,
    occurrences: u32,
}

/// JSON output of a cluster query: its top terms and its papers
#[derive(Debug, Serialize)]
struct ClusterReport<'a> {
    cluster_id: i32,
    keywords: Vec<TermCount>,
    papers: &'a [ResultRow],
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();
}

/// Load the index from the database
async fn open_index(db_path: &Path, with_clusters: bool) -> Result<PaperIndex> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database file not found: {}\n\
             Please run the import binary first to create the database.",
            db_path.display()
        );
    }

    info!("Loading database from: {}", db_path.display());

    let mut storage = SqliteStorage::new(db_path.to_string_lossy().to_string());
    storage
        .initialize()
        .await
        .with_context(|| "Failed to initialize storage")?;

    let snapshot = storage
        .load_index(with_clusters)
        .await
        .with_context(|| "Failed to load index from database")?;

    let index = PaperIndex::load(snapshot);
    if index.is_empty() {
        anyhow::bail!(
            "Database is empty (0 papers found).\n\
             Please run the import binary to add papers first."
        );
    }

    info!(
        "Index ready: {} papers, {} dimensions",
        index.len(),
        index.dimension()
    );
    Ok(index)
}

fn result_row(index: &PaperIndex, rank: usize, paper_id: usize, score: f64) -> ResultRow {
    let (title, abstract_url, pdf_url) = match index.paper(paper_id) {
        Some(paper) => (
            paper.title().to_string(),
            paper.abstract_url.clone(),
            paper.pdf_url.clone(),
        ),
        None => Default::default(),
    };
    ResultRow {
        rank,
        paper_id,
        title,
        score,
        abstract_url,
        pdf_url,
    }
}

/// Execute a query and return the ranked rows
fn execute_query(index: &PaperIndex, query: &Query, count: Option<usize>) -> Result<Vec<ResultRow>> {
    debug!("Executing query: {:?}", query);

    let rows = match query {
        Query::Similar(paper_id) => index
            .find_similar(*paper_id, count.unwrap_or(DEFAULT_SIMILAR_COUNT))
            .with_context(|| format!("Failed to find papers similar to {}", paper_id))?
            .into_iter()
            .enumerate()
            .map(|(i, hit)| result_row(index, i + 1, hit.paper_id, hit.distance))
            .collect(),
        Query::Title(title) => index
            .find_by_title(title)
            .map(|paper_id| vec![result_row(index, 1, paper_id, 0.0)])
            .unwrap_or_default(),
        Query::Keywords(keywords) => index
            .find_by_keywords(keywords, count.unwrap_or(0))
            .with_context(|| format!("Failed to search keywords {:?}", keywords))?
            .into_iter()
            .enumerate()
            .map(|(i, hit)| result_row(index, i + 1, hit.paper_id, f64::from(hit.score)))
            .collect(),
        Query::Cluster(cluster_id) => index
            .papers_in_cluster(*cluster_id)
            .into_iter()
            .enumerate()
            .map(|(i, paper_id)| result_row(index, i + 1, paper_id, f64::from(*cluster_id)))
            .collect(),
    };

    Ok(rows)
}

fn score_label(query: &Query) -> &'static str {
    match query {
        Query::Similar(_) => "Distance",
        Query::Title(_) => "-",
        Query::Keywords(_) => "Score",
        Query::Cluster(_) => "Cluster",
    }
}

/// Format results as a pretty table
fn format_results_table(rows: &[ResultRow], score_label: &str) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Id").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new(score_label).add_attribute(Attribute::Bold),
    ]);

    for row in rows {
        // Truncate long titles
        let title_display = if row.title.chars().count() > 70 {
            format!("{}...", row.title.chars().take(67).collect::<String>())
        } else {
            row.title.clone()
        };

        table.add_row(vec![
            Cell::new(row.rank),
            Cell::new(row.paper_id).fg(Color::Cyan),
            Cell::new(title_display),
            Cell::new(format!("{:.4}", row.score)),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(rows: &[ResultRow]) -> Result<String> {
    serde_json::to_string_pretty(rows).with_context(|| "Failed to serialize results to JSON")
}

fn cluster_terms(index: &PaperIndex, cluster_id: i32, count: Option<usize>) -> Vec<TermCount> {
    index
        .cluster_keywords(cluster_id, count.unwrap_or(DEFAULT_CLUSTER_KEYWORDS))
        .into_iter()
        .map(|(term, occurrences)| TermCount { term, occurrences })
        .collect()
}

fn join_terms(terms: &[TermCount]) -> String {
    terms
        .iter()
        .map(|t| format!("{} ({})", t.term, t.occurrences))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print the top terms of a cluster
fn print_cluster_keywords(index: &PaperIndex, cluster_id: i32, count: Option<usize>) {
    let terms = cluster_terms(index, cluster_id, count);
    if terms.is_empty() {
        return;
    }
    println!("cluster[{}] keywords: {}", cluster_id, join_terms(&terms));
}

/// Format a cluster query as JSON, keyword summary included
fn format_cluster_json(
    index: &PaperIndex,
    cluster_id: i32,
    count: Option<usize>,
    rows: &[ResultRow],
) -> Result<String> {
    let report = ClusterReport {
        cluster_id,
        keywords: cluster_terms(index, cluster_id, count),
        papers: rows,
    };
    serde_json::to_string_pretty(&report).with_context(|| "Failed to serialize cluster to JSON")
}

/// Run a query and print its results
fn run_query(
    index: &PaperIndex,
    query: &Query,
    count: Option<usize>,
    format: OutputFormat,
) -> Result<Vec<ResultRow>> {
    let start = Instant::now();
    let rows = execute_query(index, query, count)?;
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Table => {
            if let Query::Cluster(cluster_id) = query {
                print_cluster_keywords(index, *cluster_id, count);
            }
            println!("{}", format_results_table(&rows, score_label(query)));
            println!(
                "\nFound {} results in {:.3}s",
                rows.len(),
                elapsed.as_secs_f64()
            );
        }
        OutputFormat::Json => {
            let json = match query {
                Query::Cluster(cluster_id) => {
                    format_cluster_json(index, *cluster_id, count, &rows)?
                }
                _ => format_results_json(&rows)?,
            };
            println!("{}", json);
        }
    }

    Ok(rows)
}

/// Display detailed view of a single paper
fn display_paper_detail(index: &PaperIndex, row: &ResultRow) {
    let Some(paper) = index.paper(row.paper_id) else {
        return;
    };

    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", row.rank);
    println!("Id: {}", row.paper_id);
    println!("Title: {}", paper.title());
    println!("Abstract: {}", paper.abstract_url);
    println!("PDF: {}", paper.pdf_url);
    if let Some(cluster_id) = index.cluster_id(row.paper_id) {
        println!("Cluster: {}", cluster_id);
    }

    let top_terms: Vec<TermCount> = index
        .paper_keywords(row.paper_id, DETAIL_TERMS)
        .into_iter()
        .map(|(term, occurrences)| TermCount { term, occurrences })
        .collect();
    println!("Top abstract terms: {}", join_terms(&top_terms));
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("Commands:");
    println!("  <keywords>        - Rank papers matching all keywords");
    println!("  /similar ID       - Papers similar to paper ID");
    println!("  /title TEXT       - First paper whose title contains TEXT");
    println!("  /keywords KW...   - Rank papers matching all keywords");
    println!("  /cluster ID       - Papers and top terms of cluster ID");
    println!("  /count N          - Set number of results to N (0 resets)");
    println!("  /format table     - Use table output format");
    println!("  /format json      - Use JSON output format");
    println!("  /detail N         - Show full details for result rank N");
    println!("  /help             - Show this help");
    println!("  Ctrl+D or Ctrl+C  - Exit");
}

/// Parse a REPL line into a query, or report why it is not one
fn parse_command(parts: &[&str]) -> std::result::Result<Query, String> {
    match parts {
        ["/similar", id] => id
            .parse::<usize>()
            .map(Query::Similar)
            .map_err(|_| "Invalid paper id: must be a non-negative integer".to_string()),
        ["/similar", ..] => Err("Usage: /similar ID".to_string()),
        ["/title", rest @ ..] if !rest.is_empty() => Ok(Query::Title(rest.join(" "))),
        ["/title"] => Err("Usage: /title TEXT".to_string()),
        ["/keywords", rest @ ..] if !rest.is_empty() => Ok(Query::Keywords(
            rest.iter().map(|kw| kw.to_string()).collect(),
        )),
        ["/keywords"] => Err("Usage: /keywords KW...".to_string()),
        ["/cluster", id] => id
            .parse::<i32>()
            .map(Query::Cluster)
            .map_err(|_| "Invalid cluster id: must be an integer".to_string()),
        ["/cluster", ..] => Err("Usage: /cluster ID".to_string()),
        [command, ..] => Err(format!(
            "Unknown command: {}. Type /help for available commands.",
            command
        )),
        [] => Err("Empty command".to_string()),
    }
}

/// Run interactive REPL mode
fn run_interactive(
    index: &PaperIndex,
    mut count: Option<usize>,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Paper Search ({} papers)", index.len());
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;

    let mut last_results: Vec<ResultRow> = Vec::new();

    loop {
        let readline = rl.readline("Search> ");
        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok(); // Ignore errors from adding to history

                let parts: Vec<&str> = line.split_whitespace().collect();
                let query = match parts[0] {
                    "/help" => {
                        print_help();
                        continue;
                    }
                    "/count" => {
                        match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(0)) => {
                                count = None;
                                println!("Reset count to defaults");
                            }
                            Some(Ok(n)) => {
                                count = Some(n);
                                println!("Set count to {}", n);
                            }
                            _ => eprintln!("Usage: /count N"),
                        }
                        continue;
                    }
                    "/format" => {
                        match parts.get(1).copied() {
                            Some("table") => {
                                format = OutputFormat::Table;
                                println!("Set output format to table");
                            }
                            Some("json") => {
                                format = OutputFormat::Json;
                                println!("Set output format to JSON");
                            }
                            _ => eprintln!("Usage: /format [table|json]"),
                        }
                        continue;
                    }
                    "/detail" => {
                        match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_results.len() => {
                                display_paper_detail(index, &last_results[rank - 1]);
                            }
                            Some(Ok(rank)) if rank > last_results.len() => {
                                eprintln!(
                                    "Rank {} out of range (last search had {} results)",
                                    rank,
                                    last_results.len()
                                );
                            }
                            _ => eprintln!("Usage: /detail N"),
                        }
                        continue;
                    }
                    first if first.starts_with('/') => match parse_command(&parts) {
                        Ok(query) => query,
                        Err(message) => {
                            eprintln!("{}", message);
                            continue;
                        }
                    },
                    _ => Query::Keywords(parts.iter().map(|kw| kw.to_string()).collect()),
                };

                match run_query(index, &query, count, format) {
                    Ok(rows) => last_results = rows,
                    Err(e) => eprintln!("Search failed: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level);

    let query = if let Some(paper_id) = args.similar {
        Some(Query::Similar(paper_id))
    } else if let Some(title) = args.title.clone() {
        Some(Query::Title(title))
    } else if let Some(keywords) = args.keywords.clone() {
        Some(Query::Keywords(keywords))
    } else {
        args.cluster.map(Query::Cluster)
    };

    if !args.interactive && query.is_none() {
        anyhow::bail!(
            "One of --similar, --title, --keywords, --cluster or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    // Cluster summaries need the labels even without --with-clusters
    let with_clusters = args.with_clusters || args.interactive || args.cluster.is_some();
    let index = open_index(&args.db_path, with_clusters).await?;

    match query {
        Some(query) => {
            run_query(&index, &query, args.count, args.format)?;
        }
        None => run_interactive(&index, args.count, args.format)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_vec_search::{EmbeddingMatrix, PaperRecord, TermFrequencies};

    fn clustered_index() -> PaperIndex {
        let vectors = EmbeddingMatrix::from_rows(vec![vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let records = [
            ("Depth from Stereo", vec![("depth", 3), ("stereo", 1)]),
            ("Conditional GANs", vec![("gan", 2)]),
            ("Light Field Depth", vec![("depth", 1), ("light", 4)]),
        ]
        .into_iter()
        .map(|(title, terms)| {
            let freq: TermFrequencies =
                terms.into_iter().map(|(t, c)| (t.to_string(), c)).collect();
            PaperRecord::new(title, "", "", freq)
        })
        .collect();
        PaperIndex::new(vectors, records, Some(vec![0, 1, 0]))
    }

    #[test]
    fn test_cluster_json_includes_keywords() {
        let index = clustered_index();
        let query = Query::Cluster(0);
        let rows = execute_query(&index, &query, None).unwrap();
        let json = format_cluster_json(&index, 0, None, &rows).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["cluster_id"], 0);
        assert_eq!(value["keywords"][0]["term"], "depth");
        assert_eq!(value["keywords"][0]["occurrences"], 4);
        assert_eq!(value["keywords"][1]["term"], "light");
        assert_eq!(value["papers"].as_array().unwrap().len(), 2);
        assert_eq!(value["papers"][1]["paper_id"], 2);
    }

    #[test]
    fn test_cluster_json_respects_count() {
        let index = clustered_index();
        let rows = execute_query(&index, &Query::Cluster(0), Some(1)).unwrap();
        let json = format_cluster_json(&index, 0, Some(1), &rows).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["keywords"].as_array().unwrap().len(), 1);
    }
}
