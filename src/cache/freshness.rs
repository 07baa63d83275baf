//! The freshness cache: path → last-processed content fingerprint.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use super::{CacheError, CacheResult};
use crate::persist::write_atomic;

/// Persistent mapping from file path to the fingerprint of the content that
/// was last embedded.
///
/// Paths are used verbatim as identity. `data/a.md` and `./data/a.md` are two
/// different keys, and a renamed file looks like a brand-new one.
///
/// The cache is an owned value: load it, pass it by `&mut` through an
/// ingestion run, then [`save`](Self::save) it. Mutations never touch disk on
/// their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreshnessCache {
    entries: BTreeMap<String, Fingerprint>,
}

impl FreshnessCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache persisted at `path`.
    ///
    /// A missing file is not an error: it yields an empty cache.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Corrupt`] if the file exists but is not a valid record.
    /// - [`CacheError::Io`] if the file exists but cannot be read.
    pub fn load(path: &Path) -> CacheResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No cache at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(CacheError::Corrupt {
                    path: path.to_path_buf(),
                    reason: "not valid UTF-8".to_string(),
                });
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let cache: Self = serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        log::debug!("Loaded {} cache entries from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Load the cache, falling back to an empty one on any failure.
    ///
    /// The cache only saves work, so a damaged record costs a full re-embed
    /// and nothing else. The failure is logged as a warning.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cache) => cache,
            Err(e) => {
                log::warn!("{e}; every document will be re-embedded this run");
                Self::new()
            }
        }
    }

    /// Persist the full mapping to `path`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Persist`] if the record cannot be written.
    pub fn save(&self, path: &Path) -> CacheResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes()).map_err(|source| CacheError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Saved {} cache entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Whether the file at `path` must be (re-)processed.
    ///
    /// True if no fingerprint is stored for `path`, or the stored one differs
    /// from the file's current content. Does not modify the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be read.
    pub fn needs_processing(&self, path: &str) -> CacheResult<bool> {
        let current = Fingerprint::of_file(Path::new(path))?;
        Ok(self.is_stale(path, &current))
    }

    /// Whether `current` differs from the fingerprint stored for `path`.
    #[must_use]
    pub fn is_stale(&self, path: &str, current: &Fingerprint) -> bool {
        self.entries.get(path) != Some(current)
    }

    /// Fingerprint the file at `path` and record it as processed.
    ///
    /// In-memory only; call [`save`](Self::save) to persist.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be read. The cache is
    /// left unchanged in that case.
    pub fn record_processed(&mut self, path: &str) -> CacheResult<()> {
        let fingerprint = Fingerprint::of_file(Path::new(path))?;
        self.record_fingerprint(path, fingerprint);
        Ok(())
    }

    /// Record an already-computed fingerprint for `path`.
    pub fn record_fingerprint(&mut self, path: impl Into<String>, fingerprint: Fingerprint) {
        self.entries.insert(path.into(), fingerprint);
    }

    /// Stored fingerprint for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    /// Forget `path`. Returns the fingerprint that was stored.
    pub fn remove(&mut self, path: &str) -> Option<Fingerprint> {
        self.entries.remove(path)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over cached paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Remove entries whose file no longer exists and return their paths.
    ///
    /// Stale entries are harmless, so this only runs when asked for.
    pub fn prune_missing(&mut self) -> Vec<String> {
        let missing: Vec<String> = self
            .entries
            .keys()
            .filter(|p| !Path::new(p.as_str()).exists())
            .cloned()
            .collect();

        for path in &missing {
            log::debug!("Pruning cache entry for missing file: {path}");
            self.entries.remove(path);
        }
        missing
    }
}
