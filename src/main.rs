//! # Credit Intake CLI (`intake`)
//!
//! Ingests credit bureau PDFs into an append-only observation history and
//! prints the derived views as JSON on stdout. Diagnostics go to stderr
//! through `tracing`; set `RUST_LOG` to change the level.
//!
//! ## Usage
//!
//! ```bash
//! intake --config ./config/intake.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intake fields` | Print the field catalogue and required keys |
//! | `intake ingest <pdf> [--doc-id ID]` | Ingest a PDF (new document or re-ingest) |
//! | `intake observations <doc>` | Print the full observation history |
//! | `intake resolved <doc>` | Print the resolved profile |
//! | `intake quality <doc>` | Print the quality report |
//! | `intake entities <doc>` | Print the entity summary |
//! | `intake text <doc> [--page N]` | Print the page text preview |
//! | `intake serve` | Start the HTTP server |

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use credit_intake::config::{self, Config};
use credit_intake::documents;
use credit_intake::ingest::{ingest_document, IngestRequest};
use credit_intake::server;
use credit_intake::store_fs::JsonDirStore;
use credit_intake_core::registry::FieldRegistry;

/// Credit Intake: observation provenance and resolution for credit bureau PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/intake.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "intake",
    about = "Credit Intake: observation provenance and resolution for credit bureau PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/intake.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the field catalogue.
    ///
    /// Runs without a configuration file.
    Fields,

    /// Ingest a PDF.
    ///
    /// Creates a new document unless `--doc-id` names an existing one, in
    /// which case the run is appended to that document's history.
    Ingest {
        /// Path to the PDF.
        path: PathBuf,

        /// Existing document to re-ingest into.
        #[arg(long)]
        doc_id: Option<String>,
    },

    /// Print every observation recorded for a document.
    Observations { doc_id: String },

    /// Print the resolved profile for a document.
    Resolved { doc_id: String },

    /// Print the quality report for a document.
    Quality { doc_id: String },

    /// Print the entity summary for a document.
    Entities { doc_id: String },

    /// Print the stored page text of a document's latest run.
    Text {
        doc_id: String,

        /// Only this 1-based page.
        #[arg(long)]
        page: Option<u32>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let registry = FieldRegistry::canonical();

    // Commands that don't require config
    if let Commands::Fields = cli.command {
        return print_json(&documents::fields(&registry));
    }

    let cfg: Config = config::load_config(&cli.config)?;
    let store = JsonDirStore::from_config(&cfg);

    match cli.command {
        Commands::Fields => unreachable!(),
        Commands::Ingest { path, doc_id } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let receipt = ingest_document(
                &cfg,
                &registry,
                &store,
                IngestRequest {
                    filename,
                    bytes,
                    doc_id,
                },
            )
            .await?;
            print_json(&receipt)?;
        }
        Commands::Observations { doc_id } => {
            print_json(&documents::observations(&store, &doc_id).await?)?;
        }
        Commands::Resolved { doc_id } => {
            print_json(&documents::resolved(&cfg, &store, &doc_id).await?)?;
        }
        Commands::Quality { doc_id } => {
            print_json(&documents::quality(&cfg, &registry, &store, &doc_id).await?)?;
        }
        Commands::Entities { doc_id } => {
            print_json(&documents::entities(&store, &doc_id).await?)?;
        }
        Commands::Text { doc_id, page } => {
            print_json(&documents::text(&store, &doc_id, page).await?)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
