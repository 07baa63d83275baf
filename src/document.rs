//! Lore documents.
//!
//! A [`Document`] is the unit that gets embedded: the full text of one file
//! plus the source path it came from. Documents live for a single ingestion
//! run; persisting them is the vector store's job.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Fingerprint;

/// Errors that can occur while loading a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid UTF-8 text.
    #[error("{path} is not valid UTF-8 (first bad byte at offset {valid_up_to})")]
    InvalidUtf8 {
        /// Path of the offending file
        path: PathBuf,
        /// Length of the valid prefix
        valid_up_to: usize,
    },
}

/// Metadata carried alongside document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source identity: the file path exactly as used for the cache key
    pub source: String,
    /// Fingerprint of the exact bytes the content was decoded from
    pub fingerprint: Fingerprint,
}

/// One ingestible piece of lore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Raw text content
    pub content: String,
    /// Source and fingerprint
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document from raw file bytes.
    ///
    /// The fingerprint is computed from `bytes`, so it always describes the
    /// content this document carries even if the file changes afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidUtf8`] if `bytes` is not UTF-8.
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let source = source.into();
        let fingerprint = Fingerprint::of_bytes(&bytes);
        let content = String::from_utf8(bytes).map_err(|e| DocumentError::InvalidUtf8 {
            path: PathBuf::from(&source),
            valid_up_to: e.utf8_error().valid_up_to(),
        })?;

        Ok(Self {
            content,
            metadata: DocumentMetadata {
                source,
                fingerprint,
            },
        })
    }

    /// Build a document from text that is already in memory.
    #[must_use]
    pub fn from_text(source: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            metadata: DocumentMetadata {
                source: source.into(),
                fingerprint: Fingerprint::of_bytes(content.as_bytes()),
            },
            content,
        }
    }

    /// Read the file at `path` and build a document whose source is `source`.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Io`] if the file cannot be read.
    /// - [`DocumentError::InvalidUtf8`] if it is not UTF-8 text.
    pub fn load(path: &Path, source: impl Into<String>) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(source, bytes)
    }

    /// Source identity of this document.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Fingerprint of this document's content.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.metadata.fingerprint
    }
}
