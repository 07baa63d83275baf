//! In-memory vector store with JSON persistence.
//!
//! Documents are keyed by source, so upserting a re-embedded file replaces
//! its previous version instead of duplicating it. On disk the store is
//! wrapped in an envelope carrying a SHA-256 checksum of the payload; a file
//! that fails the check is rejected rather than silently half-loaded.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::similarity::rank_descending_by_cosine;
use super::{SearchHit, StoreError, StoreResult, VectorStore};
use crate::cache::Fingerprint;
use crate::document::Document;
use crate::persist::write_atomic;

/// Current version of the store file format.
pub const STORE_VERSION: u32 = 1;

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Full text
    pub content: String,
    /// Fingerprint of the embedded content
    pub fingerprint: Fingerprint,
    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// Vector store kept in memory and saved as a single JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryVectorStore {
    version: u32,
    /// Label of the embedder that produced the vectors
    model: String,
    dimension: usize,
    documents: BTreeMap<String, StoredDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    /// SHA-256 of the compact JSON encoding of `store`
    checksum: String,
    store: MemoryVectorStore,
}

impl MemoryVectorStore {
    /// Create an empty store for vectors from `model` of width `dimension`.
    #[must_use]
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            version: STORE_VERSION,
            model: model.into(),
            dimension,
            documents: BTreeMap::new(),
        }
    }

    /// Label of the embedder this store was built with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vector width.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored document for `source`, if any.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&StoredDocument> {
        self.documents.get(source)
    }

    /// Remove the document for `source`.
    pub fn remove(&mut self, source: &str) -> Option<StoredDocument> {
        self.documents.remove(source)
    }

    /// Sources currently held, sorted.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Drop all documents and rebind the store to a new embedder.
    ///
    /// Used when the embedding model changes and every vector is invalid.
    pub fn reset(&mut self, model: impl Into<String>, dimension: usize) {
        self.model = model.into();
        self.dimension = dimension;
        self.documents.clear();
    }

    fn checksum(&self) -> StoreResult<String> {
        let json = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Save the store to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let envelope = StoreEnvelope {
            checksum: self.checksum()?,
            store: self.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        write_atomic(path, json.as_bytes()).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Saved {} stored documents to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a store from `path`, verifying its checksum and version.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`] if the file cannot be read.
    /// - [`StoreError::Corrupt`] if it does not parse, fails the integrity
    ///   check, or has an unsupported version.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let envelope: StoreEnvelope =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

        if envelope.store.checksum()? != envelope.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }
        if envelope.store.version != STORE_VERSION {
            return Err(corrupt(format!(
                "unsupported store version {} (expected {})",
                envelope.store.version, STORE_VERSION
            )));
        }

        log::debug!(
            "Loaded {} stored documents from {}",
            envelope.store.len(),
            path.display()
        );
        Ok(envelope.store)
    }

    /// Load the store at `path`, or create an empty one if no file exists.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), except that a missing file is not an error.
    pub fn load_or_new(path: &Path, model: &str, dimension: usize) -> StoreResult<Self> {
        match Self::load(path) {
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::debug!("No vector store at {}, starting empty", path.display());
                Ok(Self::new(model, dimension))
            }
            other => other,
        }
    }
}

impl VectorStore for MemoryVectorStore {
    fn upsert(&mut self, items: Vec<(Document, Vec<f32>)>) -> StoreResult<()> {
        // Validate the whole batch first so a bad item leaves the store untouched.
        for (_, embedding) in &items {
            if embedding.len() != self.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        for (document, embedding) in items {
            let fingerprint = document.fingerprint();
            let Document { content, metadata } = document;
            self.documents.insert(
                metadata.source,
                StoredDocument {
                    content,
                    fingerprint,
                    embedding,
                },
            );
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<SearchHit>> {
        if k == 0 || self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<(&String, &StoredDocument)> = self.documents.iter().collect();
        let candidates: Vec<&[f32]> = entries.iter().map(|(_, d)| d.embedding.as_slice()).collect();
        let ranked = rank_descending_by_cosine(query, &candidates)?;

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| {
                let (source, doc) = entries[idx];
                SearchHit {
                    source: source.clone(),
                    content: doc.content.clone(),
                    score,
                }
            })
            .collect())
    }

    fn contains(&self, source: &str) -> bool {
        self.documents.contains_key(source)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}
