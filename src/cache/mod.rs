//! Freshness cache for incremental re-embedding.
//!
//! This module remembers, per file path, a fingerprint of the content that was
//! last embedded, so unchanged files are skipped on the next ingestion run.
//!
//! # Architecture
//!
//! * [`fingerprint`]: BLAKE3 content digests and their hex encoding.
//! * [`freshness`]: The [`FreshnessCache`] mapping and its JSON persistence.
//!
//! # Cache Invalidation
//!
//! An entry is fresh only while the file's current fingerprint equals the
//! stored one. Size and mtime are not consulted: touching a file without
//! changing its bytes does not trigger a re-embed.
//!
//! The cache knows nothing about the vector store. If the store is wiped, the
//! cache must be cleared too (`lorekeeper ingest --clear-cache`).

pub mod fingerprint;
pub mod freshness;

use std::path::{Path, PathBuf};

pub use fingerprint::{Fingerprint, ParseFingerprintError, FINGERPRINT_LEN};
pub use freshness::FreshnessCache;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the freshness cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A file could not be read for fingerprinting.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The persisted cache record exists but cannot be parsed.
    #[error("Cache file {path} is corrupt: {reason}")]
    Corrupt {
        /// Location of the cache record
        path: PathBuf,
        /// What went wrong while parsing
        reason: String,
    },

    /// The cache record could not be written back.
    #[error("Failed to persist cache to {path}: {source}")]
    Persist {
        /// Location of the cache record
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The in-memory cache could not be serialized.
    #[error("Failed to encode cache: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fingerprint the file at `path`.
///
/// Shorthand for [`Fingerprint::of_file`].
///
/// # Errors
///
/// Returns [`CacheError::Io`] if the file cannot be read.
pub fn fingerprint(path: &Path) -> CacheResult<Fingerprint> {
    Fingerprint::of_file(path)
}
