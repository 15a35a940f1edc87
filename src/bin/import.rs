//! Import binary entry point.
//!
//! This binary reads the artifacts exported by the offline training pipeline
//! (paper vectors, paper info and optional cluster ids) from a JSON snapshot,
//! loads them into an index and saves them into the SQLite store used by the
//! search binary.
//!
//! # Examples
//!
//! ```bash
//! import --input snapshot.json --db-path papers.db
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use paper_vec_search::{
    provider::{json::JsonFileProvider, SnapshotProvider},
    storage::{sqlite::SqliteStorage, PaperStorage},
    PaperIndex,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Import CLI for building the paper index database
#[derive(Parser, Debug)]
#[command(
    name = "import",
    version,
    about = "Build the paper index database from an exported snapshot",
    long_about = "Import paper vectors, paper info and cluster ids exported by the training \
                  pipeline into the SQLite database queried by the search binary. Any \
                  previously imported index in the database is replaced.

EXAMPLES:
  Import a snapshot:
    import --input snapshot.json --db-path papers.db

  Verbose logging:
    import --input snapshot.json --log-level debug"
)]
struct ImportArgs {
    /// Input JSON snapshot file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Database file path
    #[arg(long, value_name = "PATH", default_value = "papers.db")]
    db_path: PathBuf,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create storage instance
fn create_storage(db_path: &Path) -> Result<SqliteStorage> {
    debug!("Creating SQLite storage at: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            info!("Created database directory: {:?}", parent);
        }
    }

    Ok(SqliteStorage::new(db_path.to_string_lossy().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ImportArgs::parse();

    init_logging(&args.log_level);

    info!("Starting snapshot import");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        error!("Input file does not exist: {:?}", args.input);
        anyhow::bail!("Input file not found: {:?}", args.input);
    }

    let provider = JsonFileProvider::new(&args.input);
    info!("Loading snapshot from {}...", provider.name());
    let snapshot = provider
        .fetch_snapshot()
        .await
        .with_context(|| format!("Failed to load snapshot from {:?}", args.input))?;

    let has_clusters = snapshot.cluster_ids.is_some();
    let index = PaperIndex::load(snapshot);
    if index.is_empty() {
        warn!("Snapshot contains no usable papers");
    }

    let mut storage = create_storage(&args.db_path).context("Failed to create storage")?;
    storage
        .initialize()
        .await
        .context("Failed to initialize storage")?;

    let saved = index.save();
    storage
        .save_index(&saved)
        .await
        .context("Failed to save index")?;

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Import Completed                  ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Paper vectors:        {:>16} ║", saved.vectors.rows());
    println!("║ Paper info entries:   {:>16} ║", saved.papers.len());
    println!("║ Queryable papers:     {:>16} ║", index.len());
    println!("║ Dimensions:           {:>16} ║", index.dimension());
    println!("║ Cluster ids:          {:>16} ║", if has_clusters { "yes" } else { "no" });
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if saved.vectors.rows() != saved.papers.len() {
        warn!(
            "Vector and paper counts differ; searches only cover the first {} papers",
            index.len()
        );
    }

    info!("Import completed successfully");

    Ok(())
}
