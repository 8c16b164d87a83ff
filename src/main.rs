//! # lingest CLI
//!
//! The `lingest` binary is the operator interface for the import engine.
//!
//! ## Usage
//!
//! ```bash
//! lingest --config ./config/lingest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lingest init` | Create the SQLite database and run schema migrations |
//! | `lingest import <file>` | Import a JSON payload into a collection |
//! | `lingest repartition` | Re-partition a collection into fixed-size groups |
//! | `lingest stats` | Show per-collection item/group counts |
//! | `lingest serve` | Start the HTTP import API |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! lingest init --config ./config/lingest.toml
//!
//! # Import a flat word array
//! lingest import words.json --type WORD --set-id 5
//!
//! # Import sentences and split them into groups of 20 in one call
//! lingest import sentences.json --type SENTENCE --set-id 2 \
//!     --strategy SIZE --size 20
//!
//! # Re-partition an existing collection
//! lingest repartition --type SENTENCE --set-id 2 --size 30
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use lingest::ingest::{run_import, CollectionLocks};
use lingest::models::{ImportRequest, ImportSummary};
use lingest::{config, db, migrate, server, stats};

/// lingest — a bulk import and grouping engine for language-learning
/// content (words, sentences, shadowing clips).
#[derive(Parser)]
#[command(
    name = "lingest",
    about = "lingest — a bulk import and grouping engine for language-learning content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (collections, groups, items). Idempotent: running it multiple
    /// times is safe.
    Init,

    /// Import a JSON payload into a collection.
    ///
    /// The file holds either a full request object (`data`, `groups`,
    /// `strategy`, ...) or a bare array, interpreted as flat `data`.
    /// Flags override the corresponding fields in the file.
    Import {
        /// Path to the JSON payload.
        file: PathBuf,

        /// Content kind: WORD, SENTENCE, or SHADOWING.
        #[arg(long = "type")]
        kind: Option<String>,

        /// Target collection id.
        #[arg(long)]
        set_id: Option<i64>,

        /// Grouping strategy (only SIZE is supported).
        #[arg(long)]
        strategy: Option<String>,

        /// Group size for the SIZE strategy.
        #[arg(long)]
        size: Option<i64>,

        /// Group name pattern; `{n}` is replaced with the group number.
        #[arg(long)]
        name_pattern: Option<String>,

        /// First sequence position to include when re-partitioning.
        #[arg(long)]
        start_index: Option<i64>,
    },

    /// Re-partition a collection into fixed-size groups.
    ///
    /// Clears prior SIZE groups and reassigns every item in the
    /// collection's stable order. Membership of UNIT/TYPE/MANUAL groups
    /// is untouched.
    Repartition {
        /// Content kind: WORD, SENTENCE, or SHADOWING.
        #[arg(long = "type")]
        kind: String,

        /// Target collection id.
        #[arg(long)]
        set_id: i64,

        /// Number of items per group.
        #[arg(long)]
        size: i64,

        /// Group name pattern; `{n}` is replaced with the group number.
        #[arg(long)]
        name_pattern: Option<String>,

        /// First sequence position to include.
        #[arg(long)]
        start_index: Option<i64>,
    },

    /// Show per-collection item, group, and audio-backlog counts.
    Stats,

    /// Start the HTTP import API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            file,
            kind,
            set_id,
            strategy,
            size,
            name_pattern,
            start_index,
        } => {
            let mut request = read_payload(&file)?;
            if kind.is_some() {
                request.kind = kind;
            }
            if set_id.is_some() {
                request.set_id = set_id;
            }
            if strategy.is_some() {
                request.strategy = strategy;
            }
            if size.is_some() {
                request.size = size;
            }
            if name_pattern.is_some() {
                request.name_pattern = name_pattern;
            }
            if start_index.is_some() {
                request.start_index = start_index;
            }

            let pool = db::connect(&cfg).await?;
            let locks = CollectionLocks::new();
            let summary = run_import(&pool, &locks, &cfg, request).await?;
            pool.close().await;
            print_summary(&summary);
        }
        Commands::Repartition {
            kind,
            set_id,
            size,
            name_pattern,
            start_index,
        } => {
            // Reuses the importer's validation and per-collection lock by
            // running a request with only the re-partition phase.
            let request = ImportRequest {
                kind: Some(kind),
                set_id: Some(set_id),
                strategy: Some("SIZE".to_string()),
                size: Some(size),
                name_pattern,
                start_index,
                ..Default::default()
            };

            let pool = db::connect(&cfg).await?;
            let locks = CollectionLocks::new();
            let summary = run_import(&pool, &locks, &cfg, request).await?;
            pool.close().await;
            println!("{}", summary.message);
            println!("ok");
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn read_payload(path: &Path) -> Result<ImportRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| "Failed to parse payload as JSON")?;

    match value {
        serde_json::Value::Array(items) => Ok(ImportRequest {
            data: Some(items),
            ..Default::default()
        }),
        serde_json::Value::Object(_) => {
            serde_json::from_value(value).with_context(|| "Invalid import request shape")
        }
        _ => bail!("payload must be a JSON object or array"),
    }
}

fn print_summary(summary: &ImportSummary) {
    println!("{}", summary.message);
    println!("  succeeded: {} items", summary.success_count);
    println!("  failed:    {} items", summary.failed_count);
    for failure in &summary.errors {
        println!("  - [{}] {}", failure.index, failure.error);
    }
    if summary.failed_count as usize > summary.errors.len() {
        println!(
            "  ... and {} more",
            summary.failed_count as usize - summary.errors.len()
        );
    }
    println!("ok");
}
