//! Feature-hashing embedder.
//!
//! Maps text to a bag-of-words vector by hashing each lowercase ASCII
//! alphanumeric token into one of `dimension` buckets, then L2-normalizing.
//! It has no model weights and needs no network, which makes it the default
//! backend for offline use and tests.

use super::{Embedder, StoreResult};

/// Default vector width for [`HashedEmbedder`].
pub const DEFAULT_DIMENSION: usize = 384;

/// Deterministic, model-free embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    /// Create an embedder producing vectors of `dimension` floats (at least 1).
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashedEmbedder {
    fn model_label(&self) -> String {
        format!("hashed-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
        Ok(hashed_embedding(text, self.dimension))
    }
}

fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for token in tokens(text) {
        vector[bucket(&token, dimension)] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

// Vectors are persisted, so bucket assignment must not change between builds.
fn bucket(token: &str, dimension: usize) -> usize {
    let digest = blake3::hash(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(head) % dimension as u64) as usize
}
