//! # docvault CLI
//!
//! The `docvault` binary is the operator interface for the document
//! vault. It provides commands for database initialization, document
//! ingestion, semantic search, and browsing the stored project and
//! document catalog.
//!
//! ## Usage
//!
//! ```bash
//! docvault --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvault init` | Create the SQLite database and run schema migrations |
//! | `docvault ingest <file>` | Extract, chunk, embed, and store a document |
//! | `docvault query "<text>"` | Retrieve the most relevant chunks for a query |
//! | `docvault projects` | List all projects with stored documents |
//! | `docvault documents <project>` | List a project's documents |
//! | `docvault show <file>` | Print every stored chunk of a document |
//! | `docvault delete <file>` | Remove all chunks of a document |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docvault init --config ./config/docvault.toml
//!
//! # Ingest a report into a project
//! docvault ingest ./reports/q3.pdf --project finance --category report
//!
//! # Re-ingest, discarding the previous version first
//! docvault ingest ./reports/q3.pdf --project finance --replace
//!
//! # Query, scoped to one project
//! docvault query "revenue forecast" --project finance --top-k 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use docvault::config;
use docvault::embedding::create_embedder;
use docvault::index;
use docvault::ingest::{self, IngestOptions};
use docvault::models::MetadataFilter;
use docvault::retrieve;
use docvault::split::Splitter;
use docvault::store::open_store;

/// docvault CLI — a document ingestion and vector retrieval service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docvault",
    about = "docvault — document ingestion and vector retrieval",
    version,
    long_about = "docvault ingests documents (pdf, docx, pptx, xlsx, plain text), splits them \
    into overlapping chunks, embeds each chunk via a configurable provider, and answers \
    free-text queries with the most relevant chunks, optionally scoped by project or document."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docvault.toml`. Store, chunking, embedding,
    /// and retrieval settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the chunks table, and its
    /// indexes. This command is idempotent — running it multiple times
    /// is safe.
    Init,

    /// Ingest a document.
    ///
    /// Extracts text from the file, splits it into overlapping chunks,
    /// embeds every chunk, and commits them to the store as one atomic
    /// batch. A failure at any stage leaves the store unchanged.
    Ingest {
        /// Path to the document (pdf, docx, pptx, xlsx, or plain text).
        file: PathBuf,

        /// Project the document belongs to.
        #[arg(long, default_value = "")]
        project: String,

        /// Free-form category tag (e.g. `report`, `manual`).
        #[arg(long, default_value = "")]
        category: String,

        /// Free-form description stored with every chunk.
        #[arg(long, default_value = "")]
        description: String,

        /// Delete the document's previously stored chunks first.
        ///
        /// Without this flag a re-ingest appends a second generation of
        /// chunks alongside the old one.
        #[arg(long)]
        replace: bool,
    },

    /// Retrieve the chunks most relevant to a query.
    Query {
        /// The query text.
        query: String,

        /// Maximum number of chunks to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Only search chunks belonging to this project.
        #[arg(long)]
        project: Option<String>,

        /// Only search chunks of this document.
        #[arg(long)]
        file: Option<String>,

        /// Only search chunks with this category.
        #[arg(long)]
        category: Option<String>,
    },

    /// List all projects with at least one stored document.
    Projects,

    /// List the documents stored under a project.
    Documents {
        /// Project name.
        project: String,
    },

    /// Print every stored chunk of a document, in ingestion order.
    Show {
        /// Document file name (as stored, not a path).
        file_name: String,
    },

    /// Delete all stored chunks of a document.
    Delete {
        /// Document file name (as stored, not a path).
        file_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = docvault::db::connect(&cfg.store).await?;
            docvault::migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            project,
            category,
            description,
            replace,
        } => {
            let store = open_store(&cfg).await?;
            let embedder: Arc<dyn docvault::embedding::Embedder> =
                Arc::from(create_embedder(&cfg.embedding)?);
            let splitter = Splitter::new(cfg.chunking.chunk_size, cfg.chunking.chunk_overlap)?;
            let opts = IngestOptions {
                project,
                category,
                description,
                replace,
            };
            let report = ingest::ingest_file(store.as_ref(), embedder, splitter, &file, &opts)
                .await
                .with_context(|| format!("failed to ingest {}", file.display()))?;
            println!("ingested: {}", report.file_name);
            println!("  segments:       {}", report.segments);
            println!("  chunks written: {}", report.chunks_written);
            if report.replaced_prior {
                println!("  replaced prior version");
            }
        }
        Commands::Query {
            query,
            top_k,
            project,
            file,
            category,
        } => {
            let store = open_store(&cfg).await?;
            let embedder = create_embedder(&cfg.embedding)?;
            let filter = MetadataFilter {
                project,
                file_name: file,
                category,
            };
            let filter = if filter.is_empty() { None } else { Some(&filter) };
            let k = top_k.unwrap_or(cfg.retrieval.top_k);
            let results =
                retrieve::answer_query(store.as_ref(), embedder.as_ref(), &query, k, filter)
                    .await?;
            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, chunk) in results.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} ({})",
                    i + 1,
                    chunk.score,
                    chunk.metadata.file_name,
                    chunk.metadata.project
                );
                println!("    {}", snippet(&chunk.text, 200));
                println!();
            }
        }
        Commands::Projects => {
            let store = open_store(&cfg).await?;
            let projects = index::list_projects(store.as_ref()).await?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for project in projects {
                println!("{}", project);
            }
        }
        Commands::Documents { project } => {
            let store = open_store(&cfg).await?;
            let documents = index::list_documents(store.as_ref(), &project).await?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for doc in documents {
                println!("{}", doc);
            }
        }
        Commands::Show { file_name } => {
            let store = open_store(&cfg).await?;
            let chunks = index::get_document(store.as_ref(), &file_name).await?;
            if chunks.is_empty() {
                println!("No such document: {}", file_name);
                return Ok(());
            }
            let meta = &chunks[0].metadata;
            println!("--- Document ---");
            println!("file_name:   {}", meta.file_name);
            println!("file_path:   {}", meta.file_path);
            println!("project:     {}", meta.project);
            println!("category:    {}", meta.category);
            println!("description: {}", meta.description);
            println!("ingested_at: {}", meta.ingested_at);
            println!();
            println!("--- Chunks ({}) ---", chunks.len());
            for (i, chunk) in chunks.iter().enumerate() {
                println!("[chunk {}]", i);
                println!("{}", chunk.text);
                println!();
            }
        }
        Commands::Delete { file_name } => {
            let store = open_store(&cfg).await?;
            if store.delete_by_file_name(&file_name).await? {
                println!("deleted: {}", file_name);
            } else {
                println!("not found: {}", file_name);
            }
        }
    }

    Ok(())
}

/// First `max` characters of `text` on a single line.
fn snippet(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max)
        .collect();
    if text.chars().count() > max {
        format!("{}...", flat.trim_end())
    } else {
        flat
    }
}
