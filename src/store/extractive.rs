//! Offline extractive language model.
//!
//! Answers by quoting the sentences of the retrieved passages that share the
//! most words with the question, followed by the sources they came from.
//! Deterministic and free of model weights, like [`super::HashedEmbedder`].

use std::collections::BTreeSet;

use super::embedder::tokens;
use super::{LanguageModel, SearchHit, StoreResult};

/// Sentences quoted per answer when not configured.
pub const DEFAULT_MAX_SENTENCES: usize = 3;

/// Reply when retrieval found nothing.
pub const NO_LORE_ANSWER: &str = "No stored lore covers this question.";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "did", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "the", "to", "was", "what", "when", "where", "which", "who",
    "why", "with",
];

/// Model that quotes the most relevant sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractiveModel {
    max_sentences: usize,
}

impl ExtractiveModel {
    /// Quote at most `max_sentences` sentences (at least 1).
    #[must_use]
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }
}

impl Default for ExtractiveModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENTENCES)
    }
}

struct Candidate<'a> {
    passage: usize,
    position: usize,
    score: usize,
    text: &'a str,
}

fn keywords(text: &str) -> BTreeSet<String> {
    tokens(text)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn sentences(content: &str) -> impl Iterator<Item = &str> {
    content
        .split_inclusive(|c| matches!(c, '.' | '!' | '?' | '\n'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl LanguageModel for ExtractiveModel {
    fn model_label(&self) -> String {
        format!("extractive-{}", self.max_sentences)
    }

    fn answer(&self, question: &str, passages: &[SearchHit]) -> StoreResult<String> {
        if passages.is_empty() {
            return Ok(NO_LORE_ANSWER.to_string());
        }

        let wanted = keywords(question);
        let mut candidates: Vec<Candidate<'_>> = passages
            .iter()
            .enumerate()
            .flat_map(|(passage, hit)| {
                let wanted = &wanted;
                sentences(&hit.content)
                    .enumerate()
                    .map(move |(position, text)| Candidate {
                        passage,
                        position,
                        score: keywords(text).intersection(wanted).count(),
                        text,
                    })
            })
            .filter(|c| c.score > 0)
            .collect();

        // Best score first; ties keep retrieval order.
        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.passage.cmp(&b.passage))
                .then(a.position.cmp(&b.position))
        });
        candidates.truncate(self.max_sentences);
        candidates.sort_by_key(|c| (c.passage, c.position));

        if candidates.is_empty() {
            // Nothing overlaps: quote the opening of the best passage.
            let opening = sentences(&passages[0].content).next().unwrap_or_default();
            return Ok(format!("{opening}\n\nSources: {}", passages[0].source));
        }

        let quoted: Vec<&str> = candidates.iter().map(|c| c.text).collect();
        let mut sources: Vec<&str> = Vec::new();
        for candidate in &candidates {
            let source = passages[candidate.passage].source.as_str();
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        Ok(format!(
            "{}\n\nSources: {}",
            quoted.join(" "),
            sources.join(", ")
        ))
    }
}
