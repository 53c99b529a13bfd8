//! Retrieval index entries and per-request scored results.

use serde::{Deserialize, Serialize};

/// A bounded span of policy text with its embedding.
///
/// Chunks are created once while the index is built and never change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChunk {
    /// Unique chunk id: the section id, or `<section>#<n>` for multi-window sections.
    pub id: String,
    /// The policy section this chunk was cut from.
    pub section_ref: String,
    /// Title of the originating section, carried for the model's benefit.
    pub title: String,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A chunk annotated with its similarity to one query.
///
/// Exists only for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub section_ref: String,
    pub title: String,
    pub text: String,
    /// Similarity in `[0, 1]`.
    pub score: f32,
}

impl ScoredChunk {
    /// Build a scored view of `chunk`, dropping the embedding.
    pub fn from_chunk(chunk: &PolicyChunk, score: f32) -> Self {
        Self {
            id: chunk.id.clone(),
            section_ref: chunk.section_ref.clone(),
            title: chunk.title.clone(),
            text: chunk.text.clone(),
            score,
        }
    }

    /// True when `reference` names this chunk or its section.
    pub fn is_cited_by(&self, reference: &str) -> bool {
        let reference = reference.trim();
        !reference.is_empty()
            && (self.id.eq_ignore_ascii_case(reference)
                || self.section_ref.eq_ignore_ascii_case(reference))
    }
}
