//! Ingestion driver.
//!
//! Walks a lore directory, consults the [`FreshnessCache`] for each file and
//! produces only the documents that must be (re-)embedded.
//!
//! Two entry points share the same scan:
//!
//! * [`collect_changed_documents`]: one call that scans, records every
//!   changed file in the cache and saves it once. The cache then claims the
//!   documents are processed before anyone has embedded them.
//! * [`plan`] / [`commit`] / [`run_pipeline`]: the scan leaves the cache
//!   untouched and fingerprints are recorded only for documents the vector
//!   store accepted. A failed embed leaves the file unrecorded, so the next
//!   run retries it. The CLI uses this path.
//!
//! [`FreshnessCache`]: crate::cache::FreshnessCache

pub mod driver;
pub mod pipeline;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cache::CacheError;
use crate::document::DocumentError;
use crate::progress::ProgressCallback;
use crate::scanner::{ScanError, WalkerConfig};
use crate::store::StoreError;

pub use driver::{collect_changed_documents, plan, Collection};
pub use pipeline::{commit, preview, reconcile, run_pipeline, PipelineReport};

/// A per-file failure. The file is skipped and left unrecorded.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The walk could not access an entry.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The file could not be fingerprinted.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The file could not be loaded as text.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Run-level ingestion failures.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The root directory is missing or unusable.
    #[error("Cannot ingest {path}: {source}")]
    Root {
        /// Root that was requested
        path: PathBuf,
        /// Why it cannot be walked
        #[source]
        source: ScanError,
    },

    /// The run was interrupted; the cache on disk was not touched.
    #[error("Ingestion interrupted")]
    Interrupted,

    /// Documents were produced but the cache could not be written back.
    ///
    /// The documents are still available through [`IngestError::into_collection`].
    #[error("{source}")]
    Persist {
        /// The save failure
        #[source]
        source: CacheError,
        /// What the run produced before the save failed
        collection: Box<Collection>,
    },

    /// The vector store could not be persisted.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Recover the documents of a run whose cache save failed.
    #[must_use]
    pub fn into_collection(self) -> Option<Collection> {
        match self {
            Self::Persist { collection, .. } => Some(*collection),
            _ => None,
        }
    }
}

/// Options shared by every ingestion entry point.
#[derive(Clone, Default)]
pub struct IngestOptions {
    /// Which files to visit.
    pub walker: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for IngestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestOptions")
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl IngestOptions {
    /// Options with the given walker configuration.
    #[must_use]
    pub fn new(walker: WalkerConfig) -> Self {
        Self {
            walker,
            ..Default::default()
        }
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}
