//! lorekeeper - incremental ingestion for a TTRPG lore RAG pipeline
//!
//! Scans a folder of campaign notes, re-embeds only the documents whose
//! content changed since the last run and keeps a freshness cache of BLAKE3
//! fingerprints beside the vector store.

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod persist;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;

use crate::cache::FreshnessCache;
use crate::cli::{Cli, Commands, IngestArgs, OutputFormat, QueryArgs, ScanArgs, StatusArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::ingest::{preview, run_pipeline, Collection, IngestError, IngestOptions, PipelineReport};
use crate::progress::Progress;
use crate::scanner::normalize_extension;
use crate::signal::ShutdownHandler;
use crate::store::{
    ask, retrieve, Embedder, ExtractiveModel, HashedEmbedder, MemoryVectorStore, SearchHit,
    StoreError, VectorStore,
};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for run-level failures. [`error::exit_code_for`] maps it
/// to the process exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    let handler = signal::install_handler()?;
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest(args) => {
            apply_scan_overrides(&mut config, &args.scan)?;
            if let Some(ref store) = args.store {
                config.store_path = Some(store.clone());
            }
            run_ingest(&config, &args, cli.quiet, &handler)
        }
        Commands::Status(args) => {
            apply_scan_overrides(&mut config, &args.scan)?;
            if let Some(ref store) = args.store {
                config.store_path = Some(store.clone());
            }
            run_status(&config, &args, &handler)
        }
        Commands::Query(args) => {
            if let Some(ref store) = args.store {
                config.store_path = Some(store.clone());
            }
            run_query(&config, &args)
        }
    }
}

fn apply_scan_overrides(config: &mut Config, args: &ScanArgs) -> anyhow::Result<()> {
    if !args.extensions.is_empty() {
        config.extensions = args
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();
    }
    config.ignore_patterns.extend(args.ignore_patterns.iter().cloned());
    config.skip_hidden |= args.skip_hidden;
    config.follow_symlinks |= args.follow_symlinks;
    if let Some(ref cache) = args.cache {
        config.cache_path = Some(cache.clone());
    }
    config.validate()?;
    Ok(())
}

fn scan_options(config: &Config, handler: &ShutdownHandler) -> IngestOptions {
    IngestOptions::new(config.walker_config()).with_shutdown_flag(handler.get_flag())
}

/// Open the store for `embedder`, starting over when it was built by a
/// different embedder or cannot be trusted.
fn open_store(path: &Path, embedder: &HashedEmbedder) -> anyhow::Result<MemoryVectorStore> {
    let label = embedder.model_label();
    let mut store = match MemoryVectorStore::load_or_new(path, &label, embedder.dimension()) {
        Ok(store) => store,
        Err(e @ StoreError::Corrupt { .. }) => {
            log::warn!("{e}; rebuilding the vector store");
            MemoryVectorStore::new(label.clone(), embedder.dimension())
        }
        Err(e) => return Err(e).context("Failed to open the vector store"),
    };

    if store.model() != label || store.dimension() != embedder.dimension() {
        log::warn!(
            "Vector store was built with {} ({} dims), now using {} ({} dims); re-embedding everything",
            store.model(),
            store.dimension(),
            label,
            embedder.dimension()
        );
        store.reset(label, embedder.dimension());
    }
    Ok(store)
}

fn run_ingest(
    config: &Config,
    args: &IngestArgs,
    quiet: bool,
    handler: &ShutdownHandler,
) -> anyhow::Result<ExitCode> {
    let root = args.scan.path.as_path();
    let cache_path = config.resolved_cache_path();
    let store_path = config.resolved_store_path();

    let mut cache = if args.no_cache {
        log::info!("Freshness cache disabled; every document will be embedded");
        FreshnessCache::new()
    } else {
        FreshnessCache::load_or_empty(&cache_path)
    };
    if args.clear_cache {
        log::info!("Clearing {} cache entries", cache.len());
        cache.clear();
    }

    let embedder = HashedEmbedder::new(config.embedding_dimension);
    let mut store = open_store(&store_path, &embedder)?;

    if args.dry_run {
        let collection = preview(root, &cache, &store, &scan_options(config, handler))?;
        print_status(&collection, &store, quiet);
        return Ok(partial_if(collection.has_errors()));
    }

    if args.prune {
        prune(&mut cache, &mut store);
    }

    let options = scan_options(config, handler)
        .with_progress_callback(Arc::new(Progress::new(quiet)));
    let report = run_pipeline(
        root,
        &mut cache,
        &embedder,
        &mut store,
        config.batch_size,
        &options,
    )?;

    // Store before cache: a crash in between only causes re-embedding.
    store.save(&store_path).map_err(IngestError::from)?;
    if !args.no_cache {
        if let Err(source) = cache.save(&cache_path) {
            return Err(IngestError::Persist {
                source,
                collection: Box::new(Collection {
                    files_seen: report.files_seen,
                    unchanged: report.unchanged,
                    bytes: report.bytes_embedded,
                    ..Default::default()
                }),
            }
            .into());
        }
    }

    if !quiet {
        print_report(&report, store.len());
    }
    Ok(partial_if(report.is_partial()))
}

/// Forget cached files and stored documents that no longer exist on disk.
fn prune(cache: &mut FreshnessCache, store: &mut MemoryVectorStore) {
    let pruned = cache.prune_missing();
    let gone: Vec<String> = store
        .sources()
        .filter(|s| !Path::new(s).exists())
        .map(str::to_owned)
        .collect();
    for source in &gone {
        store.remove(source);
    }
    log::info!(
        "Pruned {} cache entries and {} stored documents for deleted files",
        pruned.len(),
        gone.len()
    );
}

fn run_status(
    config: &Config,
    args: &StatusArgs,
    handler: &ShutdownHandler,
) -> anyhow::Result<ExitCode> {
    let cache = FreshnessCache::load_or_empty(&config.resolved_cache_path());
    let embedder = HashedEmbedder::new(config.embedding_dimension);
    let store = open_store(&config.resolved_store_path(), &embedder)?;
    let options = scan_options(config, handler);
    let collection = preview(&args.scan.path, &cache, &store, &options)?;
    print_status(&collection, &store, false);
    Ok(partial_if(collection.has_errors()))
}

fn run_query(config: &Config, args: &QueryArgs) -> anyhow::Result<ExitCode> {
    let store_path = config.resolved_store_path();
    let store = MemoryVectorStore::load(&store_path).with_context(|| {
        format!(
            "Cannot read vector store {}; run `lorekeeper ingest` first",
            store_path.display()
        )
    })?;

    let embedder = HashedEmbedder::new(store.dimension());
    if store.model() != embedder.model_label() {
        anyhow::bail!(
            "Vector store was built with {}, which this build cannot embed queries for",
            store.model()
        );
    }

    let k = args
        .top_k
        .map_or(config.top_k, |k| usize::try_from(k).unwrap_or(usize::MAX));

    if args.passages_only {
        let hits = retrieve(&embedder, &store, &args.question, k)?;
        match args.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
            OutputFormat::Text => print_passages(&hits),
        }
        return Ok(ExitCode::Success);
    }

    let model = ExtractiveModel::default();
    let answer = ask(&embedder, &store, &model, &args.question, k)?;
    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
        OutputFormat::Text => {
            println!("{}\n", answer.answer);
            print_passages(&answer.passages);
        }
    }
    Ok(ExitCode::Success)
}

fn print_passages(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No stored lore to search.");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. {} (score {:.3})", rank + 1, hit.source, hit.score);
        println!("{}\n", hit.content.trim_end());
    }
}

fn partial_if(partial: bool) -> ExitCode {
    if partial {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn print_status<S: VectorStore + ?Sized>(collection: &Collection, store: &S, quiet: bool) {
    if quiet {
        return;
    }
    for source in collection.sources() {
        let state = if store.contains(source) {
            "modified"
        } else {
            "new"
        };
        println!("{state:>9}  {source}");
    }
    for error in &collection.errors {
        eprintln!("  skipped  {error}");
    }
    println!(
        "{} to embed ({}), {} unchanged, {} skipped",
        collection.documents.len(),
        ByteSize::b(collection.bytes),
        collection.unchanged,
        collection.errors.len()
    );
}

fn print_report(report: &PipelineReport, stored: usize) {
    for error in &report.scan_errors {
        eprintln!("  skipped  {error}");
    }
    for failure in &report.failed {
        for source in &failure.sources {
            eprintln!("   failed  {source}: {}", failure.error);
        }
    }
    println!(
        "Embedded {} documents ({}), {} unchanged, {} skipped, {} failed; store holds {}",
        report.embedded.len(),
        ByteSize::b(report.bytes_embedded),
        report.unchanged,
        report.scan_errors.len(),
        report.failed_documents(),
        stored
    );
}
