//! Directory scan against the freshness cache.

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

use super::{FileError, IngestError, IngestOptions};
use crate::cache::{CacheError, Fingerprint, FreshnessCache};
use crate::document::Document;
use crate::progress::PHASE_SCANNING;
use crate::scanner::Walker;

/// Outcome of scanning a lore directory.
#[derive(Debug, Default)]
pub struct Collection {
    /// Documents needing (re-)embedding, in traversal order
    pub documents: Vec<Document>,
    /// Files that were skipped because they could not be read
    pub errors: Vec<FileError>,
    /// Qualifying files visited
    pub files_seen: usize,
    /// Files whose content matched the cache
    pub unchanged: usize,
    /// Total size of the documents produced
    pub bytes: u64,
}

impl Collection {
    /// Whether any file had to be skipped.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Sources of the produced documents.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(Document::source)
    }
}

/// Scan `root` and collect the documents whose content differs from `cache`.
///
/// The cache is only read. Each document carries the fingerprint of the exact
/// bytes it was decoded from, ready to be recorded once it is safely embedded.
///
/// Unreadable files are logged, collected in [`Collection::errors`] and
/// skipped; the walk always runs to completion.
///
/// # Errors
///
/// - [`IngestError::Root`] if `root` is not a readable directory.
/// - [`IngestError::Interrupted`] if the shutdown flag was raised.
pub fn plan(
    root: &Path,
    cache: &FreshnessCache,
    options: &IngestOptions,
) -> Result<Collection, IngestError> {
    let mut walker = Walker::new(root, options.walker.clone());
    if let Some(ref flag) = options.shutdown_flag {
        walker = walker.with_shutdown_flag(flag.clone());
    }
    walker.validate_root().map_err(|source| IngestError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    if let Some(ref callback) = options.progress_callback {
        callback.on_phase_start(PHASE_SCANNING, 0);
    }

    let mut collection = Collection::default();
    for entry in walker.walk() {
        let file = match entry {
            Ok(file) => file,
            Err(e) => {
                collection.errors.push(e.into());
                continue;
            }
        };

        collection.files_seen += 1;
        if let Some(ref callback) = options.progress_callback {
            callback.on_progress(collection.files_seen, &file.source);
        }

        // One read serves both the fingerprint and the document text.
        let bytes = match fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(source) => {
                log::warn!("Skipping unreadable file {}: {}", file.source, source);
                collection.errors.push(
                    CacheError::Io {
                        path: file.path,
                        source,
                    }
                    .into(),
                );
                continue;
            }
        };

        if !cache.is_stale(&file.source, &Fingerprint::of_bytes(&bytes)) {
            log::trace!("Unchanged: {}", file.source);
            collection.unchanged += 1;
            continue;
        }

        let size = bytes.len() as u64;
        match Document::from_bytes(file.source, bytes) {
            Ok(document) => {
                log::debug!("Changed: {}", document.source());
                collection.bytes += size;
                collection.documents.push(document);
            }
            Err(e) => {
                log::warn!("Skipping file: {e}");
                collection.errors.push(e.into());
            }
        }
    }

    if let Some(ref callback) = options.progress_callback {
        callback.on_phase_end(PHASE_SCANNING);
    }

    if options
        .shutdown_flag
        .as_ref()
        .is_some_and(|f| f.load(Ordering::SeqCst))
    {
        log::info!("Scan interrupted after {} files", collection.files_seen);
        return Err(IngestError::Interrupted);
    }

    log::info!(
        "Scanned {} files under {}: {} changed, {} unchanged, {} skipped",
        collection.files_seen,
        root.display(),
        collection.documents.len(),
        collection.unchanged,
        collection.errors.len()
    );
    Ok(collection)
}

/// Scan `root`, record every changed document in `cache` and save it once.
///
/// Each changed file yields one [`Document`] and its fingerprint is recorded
/// immediately. After the walk the cache is written to `cache_path` exactly
/// once, whatever the number of changed files. An empty result is normal.
///
/// Files that fail to read are not recorded and will be retried next run.
///
/// # Errors
///
/// - [`IngestError::Root`] if `root` is not a readable directory.
/// - [`IngestError::Interrupted`] if the shutdown flag was raised. Neither the
///   in-memory cache nor the file on disk is modified.
/// - [`IngestError::Persist`] if the save failed. The documents are kept in
///   the error; see [`IngestError::into_collection`].
pub fn collect_changed_documents(
    root: &Path,
    cache: &mut FreshnessCache,
    cache_path: &Path,
    options: &IngestOptions,
) -> Result<Collection, IngestError> {
    let collection = plan(root, cache, options)?;

    for document in &collection.documents {
        cache.record_fingerprint(document.source(), document.fingerprint());
    }

    if let Err(source) = cache.save(cache_path) {
        log::error!("{source}");
        return Err(IngestError::Persist {
            source,
            collection: Box::new(collection),
        });
    }

    Ok(collection)
}
