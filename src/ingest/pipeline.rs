//! Commit-after-upsert ingestion.
//!
//! The scan does not mark anything as processed. Changed documents are
//! embedded and upserted in batches, and a document's fingerprint is recorded
//! only after its batch was accepted by the store. Persisting is left to the
//! caller, store first and cache second, so the cache on disk never claims a
//! document the durable store does not hold.

use std::path::Path;
use std::sync::atomic::Ordering;

use super::driver::{plan, Collection};
use super::{FileError, IngestError, IngestOptions};
use crate::cache::FreshnessCache;
use crate::document::Document;
use crate::progress::PHASE_EMBEDDING;
use crate::store::{Embedder, StoreError, VectorStore};

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// A batch the embedder or store rejected.
#[derive(Debug)]
pub struct BatchFailure {
    /// Sources in the batch; none of them were recorded
    pub sources: Vec<String>,
    /// Why the batch failed
    pub error: StoreError,
}

/// Summary of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Qualifying files visited
    pub files_seen: usize,
    /// Files whose content matched the cache
    pub unchanged: usize,
    /// Sources embedded and recorded this run, in traversal order
    pub embedded: Vec<String>,
    /// Bytes of text embedded
    pub bytes_embedded: u64,
    /// Batches that failed to embed or upsert
    pub failed: Vec<BatchFailure>,
    /// Files skipped during the scan
    pub scan_errors: Vec<FileError>,
    /// Cache entries dropped because the store no longer held them
    pub forgotten: Vec<String>,
}

impl PipelineReport {
    /// Whether some files could not be read or embedded.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || !self.scan_errors.is_empty()
    }

    /// Number of documents that failed to embed.
    #[must_use]
    pub fn failed_documents(&self) -> usize {
        self.failed.iter().map(|f| f.sources.len()).sum()
    }
}

/// Record the fingerprints of documents the store has accepted.
pub fn commit(cache: &mut FreshnessCache, documents: &[Document]) {
    for document in documents {
        cache.record_fingerprint(document.source(), document.fingerprint());
    }
}

/// Drop cache entries for sources the store does not hold and return them.
///
/// The cache alone cannot tell that the store was wiped or rebuilt; without
/// this step those files would never be embedded again.
pub fn reconcile<S>(cache: &mut FreshnessCache, store: &S) -> Vec<String>
where
    S: VectorStore + ?Sized,
{
    let orphans: Vec<String> = cache
        .paths()
        .filter(|p| !store.contains(p))
        .map(str::to_owned)
        .collect();
    for path in &orphans {
        cache.remove(path);
    }
    if !orphans.is_empty() {
        log::info!(
            "{} cached files are missing from the vector store and will be re-embedded",
            orphans.len()
        );
    }
    orphans
}

/// The documents [`run_pipeline`] would embed, without touching `cache` or `store`.
///
/// Same reconciliation as a real run, applied to a copy of the cache.
///
/// # Errors
///
/// Same as [`plan`].
pub fn preview<S>(
    root: &Path,
    cache: &FreshnessCache,
    store: &S,
    options: &IngestOptions,
) -> Result<Collection, IngestError>
where
    S: VectorStore + ?Sized,
{
    let mut reconciled = cache.clone();
    reconcile(&mut reconciled, store);
    plan(root, &reconciled, options)
}

/// Scan `root`, embed what changed, upsert it and record it in `cache`.
///
/// Neither `cache` nor `store` is persisted here.
///
/// # Errors
///
/// - [`IngestError::Root`] if `root` is not a readable directory.
/// - [`IngestError::Interrupted`] if the shutdown flag was raised during the
///   scan or between batches. Batches committed before the interruption stay
///   recorded in memory; the caller decides whether to save.
pub fn run_pipeline<E, S>(
    root: &Path,
    cache: &mut FreshnessCache,
    embedder: &E,
    store: &mut S,
    batch_size: usize,
    options: &IngestOptions,
) -> Result<PipelineReport, IngestError>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    let forgotten = reconcile(cache, store);
    let collection = plan(root, cache, options)?;

    let mut report = PipelineReport {
        files_seen: collection.files_seen,
        unchanged: collection.unchanged,
        scan_errors: collection.errors,
        forgotten,
        ..Default::default()
    };

    let documents = collection.documents;
    if documents.is_empty() {
        log::info!("No new or changed documents to embed");
        return Ok(report);
    }

    if let Some(ref callback) = options.progress_callback {
        callback.on_phase_start(PHASE_EMBEDDING, documents.len());
    }

    let mut done = 0;
    for batch in documents.chunks(batch_size.max(1)) {
        if options
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
        {
            log::info!("Embedding interrupted after {} documents", done);
            return Err(IngestError::Interrupted);
        }

        match embed_and_upsert(embedder, store, batch) {
            Ok(()) => {
                commit(cache, batch);
                for document in batch {
                    report.embedded.push(document.source().to_string());
                    report.bytes_embedded += document.content.len() as u64;
                }
            }
            Err(error) => {
                log::warn!("Batch of {} documents failed: {}", batch.len(), error);
                report.failed.push(BatchFailure {
                    sources: batch.iter().map(|d| d.source().to_string()).collect(),
                    error,
                });
            }
        }

        done += batch.len();
        if let Some(ref callback) = options.progress_callback {
            if let Some(last) = batch.last() {
                callback.on_progress(done, last.source());
            }
        }
    }

    if let Some(ref callback) = options.progress_callback {
        callback.on_phase_end(PHASE_EMBEDDING);
    }

    log::info!(
        "Embedded {} documents, {} failed",
        report.embedded.len(),
        report.failed_documents()
    );
    Ok(report)
}

fn embed_and_upsert<E, S>(embedder: &E, store: &mut S, batch: &[Document]) -> Result<(), StoreError>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    if vectors.len() != batch.len() {
        return Err(StoreError::Embedding(format!(
            "expected {} vectors, got {}",
            batch.len(),
            vectors.len()
        )));
    }

    store.upsert(batch.iter().cloned().zip(vectors).collect())
}
