//! Command-line interface definitions for lorekeeper.
//!
//! # Example
//!
//! ```bash
//! # Embed new and changed notes from a campaign folder
//! lorekeeper ingest ~/campaigns/eberron
//!
//! # Only markdown, skip drafts, show what would change
//! lorekeeper ingest ~/campaigns/eberron --ext md --ignore "drafts/" --dry-run
//!
//! # Ask a question against the stored lore
//! lorekeeper query "Who rules the city of Sharn?" -k 3
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Keep a RAG vector store in sync with a folder of TTRPG lore.
///
/// Only files whose content changed since the last run are re-embedded; a
/// freshness cache of BLAKE3 fingerprints tracks what the store already holds.
#[derive(Debug, Parser)]
#[command(name = "lorekeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed new or changed documents and record them in the cache
    Ingest(IngestArgs),
    /// List documents that would be embedded, without changing anything
    Status(StatusArgs),
    /// Answer a question from the passages most similar to it
    Query(QueryArgs),
}

/// Walk settings shared by `ingest` and `status`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Lore directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// File extension to ingest, without the dot (repeatable, default: md, txt)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Gitignore-style pattern to skip (repeatable)
    ///
    /// Added to the patterns of a .gitignore at the root.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Follow symbolic links during the walk
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Path to the freshness cache file
    ///
    /// If not specified, a platform-specific path is used.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,
}

/// Arguments for the ingest subcommand.
#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Path to the vector store file
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Ignore the freshness cache and embed every document
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Empty the freshness cache before scanning
    #[arg(long, conflicts_with = "no_cache")]
    pub clear_cache: bool,

    /// Forget cache entries and stored documents whose file no longer exists
    #[arg(long)]
    pub prune: bool,

    /// Report what would be embedded without embedding or saving anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the status subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Path to the vector store file (read only)
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

/// Arguments for the query subcommand.
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Question to answer from the stored lore
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Number of passages to retrieve
    #[arg(
        short = 'k',
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub top_k: Option<u64>,

    /// Path to the vector store file
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Print the retrieved passages without asking the language model
    #[arg(long)]
    pub passages_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable answer and passages
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
