//! Embedding, vector store and language model seams.
//!
//! The pipeline needs three capabilities from the outside world: turning
//! text into vectors ([`Embedder`]), keeping vectors searchable
//! ([`VectorStore`]) and answering a question from retrieved passages
//! ([`LanguageModel`]). Real backends plug in behind these traits without
//! touching the cache or the driver.
//!
//! Bundled implementations:
//! * [`HashedEmbedder`]: deterministic feature hashing, no model required.
//! * [`MemoryVectorStore`]: cosine search over an in-memory map, saved to a
//!   single JSON file.
//! * [`ExtractiveModel`]: offline answers stitched from the passages' most
//!   relevant sentences.

pub mod embedder;
pub mod extractive;
pub mod memory;
pub mod similarity;

use std::path::PathBuf;

use serde::Serialize;

use crate::document::Document;

pub use embedder::{HashedEmbedder, DEFAULT_DIMENSION};
pub use extractive::ExtractiveModel;
pub use memory::{MemoryVectorStore, StoredDocument};

/// Number of passages retrieved per question when not configured.
pub const DEFAULT_TOP_K: usize = 2;

/// Result alias for store and embedder operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by embedders and vector stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A vector had the wrong width.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Width the store was built for
        expected: usize,
        /// Width that was supplied
        actual: usize,
    },

    /// An empty vector was supplied.
    #[error("Vectors must not be empty")]
    EmptyVector,

    /// The embedding backend failed.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The language model failed to answer.
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// The store file could not be read or written.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Location of the store file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but cannot be trusted.
    #[error("Vector store {path} is corrupt: {reason}")]
    Corrupt {
        /// Location of the store file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Serialization failure.
    #[error("Failed to encode vector store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Source path of the document
    pub source: String,
    /// Document text
    pub content: String,
    /// Cosine similarity (higher is closer)
    pub score: f32,
}

/// Turns text into vectors.
pub trait Embedder {
    /// Identifies the model; a store built with another label must be rebuilt.
    fn model_label(&self) -> String;

    /// Width of produced vectors.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Embedding`] if the backend fails.
    fn embed(&self, text: &str) -> StoreResult<Vec<f32>>;

    /// Embed several texts, preserving order.
    ///
    /// # Errors
    ///
    /// Fails if any single embedding fails.
    fn embed_batch(&self, texts: &[&str]) -> StoreResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Answers a question from retrieved passages.
pub trait LanguageModel {
    /// Identifies the model in output.
    fn model_label(&self) -> String;

    /// Answer `question` using `passages`, best passage first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Generation`] if the backend fails.
    fn answer(&self, question: &str, passages: &[SearchHit]) -> StoreResult<String>;
}

/// A question answered from stored lore.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// The question asked
    pub question: String,
    /// The model's reply
    pub answer: String,
    /// Label of the model that replied
    pub model: String,
    /// Passages the reply was based on
    pub passages: Vec<SearchHit>,
}

/// Holds embedded documents and answers nearest-neighbour queries.
pub trait VectorStore {
    /// Insert documents with their vectors, replacing any with the same source.
    ///
    /// Either every item is stored or none is.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the bundled store rejects wrong dimensions.
    fn upsert(&mut self, items: Vec<(Document, Vec<f32>)>) -> StoreResult<()>;

    /// The `k` documents closest to `query`, best first.
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<SearchHit>>;

    /// Whether a document with this source is stored.
    fn contains(&self, source: &str) -> bool;

    /// Number of stored documents.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Embed `question` and fetch the `k` most relevant passages.
///
/// # Errors
///
/// Propagates embedder and store failures.
pub fn retrieve<E, S>(
    embedder: &E,
    store: &S,
    question: &str,
    k: usize,
) -> StoreResult<Vec<SearchHit>>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    let query = embedder.embed(question)?;
    store.search(&query, k)
}

/// Retrieve the `k` most relevant passages and let `model` answer from them.
///
/// # Errors
///
/// Propagates embedder, store and model failures.
pub fn ask<E, S, M>(
    embedder: &E,
    store: &S,
    model: &M,
    question: &str,
    k: usize,
) -> StoreResult<Answer>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
    M: LanguageModel + ?Sized,
{
    let passages = retrieve(embedder, store, question, k)?;
    let answer = model.answer(question, &passages)?;
    Ok(Answer {
        question: question.to_string(),
        answer,
        model: model.model_label(),
        passages,
    })
}
