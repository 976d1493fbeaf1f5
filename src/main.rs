//! # cv-harness CLI (`cvh`)
//!
//! Ask questions about a directory of CVs from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! cvh --config ./config/cvh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cvh segment <file>` | Show how a CV is split into chunks |
//! | `cvh lang "<text>"` | Detect the language of a text |
//! | `cvh entities` | Load the CV directory and list the people found |
//! | `cvh search <id> "<query>"` | Search one person's CV |
//! | `cvh prompt "<query>"` | Show the prompt a question resolves to |
//! | `cvh ask "<query>"` | Answer a question |
//! | `cvh chat` | Answer questions read from stdin |
//!
//! ## Examples
//!
//! ```bash
//! # Which chunks and labels does this CV produce?
//! cvh segment ./data/cvs/ana_garcia.pdf
//!
//! # Who is loaded, and who is the default?
//! cvh entities --config ./config/cvh.toml
//!
//! # Ask about two people at once
//! cvh ask "Compare Ana and Carlos's Python experience"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cv_harness::assistant::Assistant;
use cv_harness::chunk::segment_with_threshold;
use cv_harness::config::{load_config, Config};
use cv_harness::error::HarnessError;
use cv_harness::extract::read_document;
use cv_harness::ingest::ingest_directory;
use cv_harness::language::{LanguageClassifier, Messages};
use cv_harness::models::ContentType;
use cv_harness::resolver::Resolution;

/// cv-harness CLI: question answering over a small set of CVs.
///
/// Commands that load CVs read `[entities].documents_dir` from the
/// configuration file given with `--config`.
#[derive(Parser)]
#[command(
    name = "cvh",
    about = "Question answering over a small set of CVs",
    version,
    long_about = "Loads every CV in a directory into its own retrieval namespace, works out \
    which person (or people) a question is about, and answers from their CVs."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cvh.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Identifier to use as default when the configured override CV is absent.
    #[arg(long = "default", global = true)]
    default_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks and print their labels.
    Segment {
        /// PDF, DOCX, TXT or MD file.
        file: PathBuf,

        /// Flush threshold in characters.
        #[arg(long)]
        flush_chars: Option<usize>,
    },

    /// Detect the language (es / en) of a text.
    Lang { text: String },

    /// Load the CV directory and list registered people.
    Entities,

    /// Search one person's CV.
    Search {
        /// Entity identifier (file stem).
        identifier: String,

        query: String,

        /// Number of chunks to return.
        #[arg(long)]
        k: Option<usize>,

        /// Restrict to one content type (technologies, education, leadership, achievements, general).
        #[arg(long)]
        content_type: Option<ContentType>,
    },

    /// Resolve a question and print the prompt, without generating.
    Prompt { query: String },

    /// Answer a question.
    Ask { query: String },

    /// Answer questions line by line from stdin until EOF or `exit`.
    Chat,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "cv_harness=debug,cvh=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Segment { file, flush_chars } => {
            let cfg = load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            return run_segment(file, flush_chars.unwrap_or(cfg.chunking.flush_chars));
        }
        Commands::Lang { text } => {
            println!("{}", LanguageClassifier::default().detect_language(text));
            return Ok(());
        }
        _ => {}
    }

    let cfg = load_config(&cli.config)?;
    let assistant = Assistant::from_config(&cfg).await?;
    let report = ingest_directory(&assistant, &cfg, cli.default_id.as_deref()).await?;
    for (path, reason) in &report.failed {
        eprintln!("Skipped {}: {}", path.display(), reason);
    }

    match cli.command {
        Commands::Segment { .. } | Commands::Lang { .. } => {}
        Commands::Entities => {
            let registry = assistant.registry().await;
            if registry.is_empty() {
                println!("No CVs loaded from {}", cfg.entities.documents_dir.display());
            }
            for entity in registry.entities() {
                let marker = if registry.is_default(&entity.canonical_id) {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{}{}  {}  [{} chunks, namespace {}]",
                    entity.canonical_id,
                    marker,
                    entity.display_name,
                    entity.chunk_count,
                    entity.namespace.name()
                );
                println!(
                    "    aliases: {}",
                    registry.aliases().aliases_for(&entity.canonical_id).join(", ")
                );
            }
        }
        Commands::Search {
            identifier,
            query,
            k,
            content_type,
        } => {
            let registry = assistant.registry().await;
            let Some(entity) = registry.lookup(&identifier) else {
                let msg = format!("No CV registered for '{}'", identifier);
                return Err(HarnessError::NotFound(msg).into());
            };
            let hits = entity
                .namespace
                .search(&query, k.unwrap_or(cfg.retrieval.top_k), content_type)
                .await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {}/{}",
                    i + 1,
                    hit.similarity_score,
                    hit.section,
                    hit.content_type
                );
                println!("    {}", hit.text);
            }
        }
        Commands::Prompt { query } => {
            let language = assistant.resolver().detect_language(&query);
            let registry = assistant.registry().await;
            let resolution = assistant
                .resolver()
                .resolve_with_language(&registry, &query, language)
                .await?;
            match resolution {
                Resolution::Prompt(resolved) => println!("{}", resolved.prompt),
                terminal => println!(
                    "{}",
                    terminal
                        .message(&Messages::for_language(language))
                        .unwrap_or_default()
                ),
            }
        }
        Commands::Ask { query } => {
            println!("{}", assistant.answer(&query).await);
        }
        Commands::Chat => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
                    break;
                }
                println!("{}\n", assistant.answer(query).await);
            }
        }
    }

    Ok(())
}

fn run_segment(file: &Path, flush_chars: usize) -> Result<()> {
    let text = read_document(file)?;
    let chunks = segment_with_threshold(&text, flush_chars.max(1));
    println!("{} chunks from {}", chunks.len(), file.display());
    for chunk in &chunks {
        println!(
            "\n[{}] section={} content_type={} ({} chars)",
            chunk.index + 1,
            chunk.section,
            chunk.content_type,
            chunk.text.chars().count()
        );
        println!("{}", chunk.text);
    }
    Ok(())
}
