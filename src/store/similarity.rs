//! Vector similarity helpers.

use std::cmp::Ordering;

use super::{StoreError, StoreResult};

/// Cosine similarity of two equal-length vectors.
///
/// Returns `0.0` when either vector has zero magnitude.
///
/// # Errors
///
/// Returns [`StoreError::EmptyVector`] or [`StoreError::DimensionMismatch`].
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> StoreResult<f32> {
    if query.is_empty() || candidate.is_empty() {
        return Err(StoreError::EmptyVector);
    }
    if query.len() != candidate.len() {
        return Err(StoreError::DimensionMismatch {
            expected: query.len(),
            actual: candidate.len(),
        });
    }

    let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
    let denom = l2_norm(query) * l2_norm(candidate);
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }
    Ok(dot / denom)
}

/// Score every candidate against `query`, best first.
///
/// Returns `(index, score)` pairs. Equal scores keep candidate order.
///
/// # Errors
///
/// Fails on the first candidate whose dimension differs from `query`.
pub fn rank_descending_by_cosine(
    query: &[f32],
    candidates: &[&[f32]],
) -> StoreResult<Vec<(usize, f32)>> {
    let mut scores = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.iter().enumerate() {
        scores.push((idx, cosine_similarity(query, candidate)?));
    }

    scores.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    Ok(scores)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
