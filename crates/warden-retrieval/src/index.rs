//! The retrieval index.
//!
//! Built once from the policy sections and read-only afterwards. Retrieval
//! is confidence gated:
//!
//! 1. Embed the query once.
//! 2. Score every chunk by cosine similarity, clamped to `[0, 1]`.
//! 3. Rank by descending score, ties by ascending chunk id.
//! 4. Take the top `2 * top_k` candidates and drop those below `threshold`.
//! 5. Return at most `top_k`.
//!
//! An empty result is a valid answer. Chunks below the threshold are never
//! substituted in.

use std::{cmp::Ordering, collections::BTreeSet, sync::Arc};

use tracing::{debug, info, warn};

use warden_contracts::{
    config::ChunkingConfig,
    corpus::PolicySection,
    error::{WardenError, WardenResult},
    retrieval::{PolicyChunk, ScoredChunk},
};
use warden_core::traits::Embedder;

use crate::chunking::chunk_section;

pub struct RetrievalIndex {
    /// Sorted by chunk id.
    chunks: Vec<PolicyChunk>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl RetrievalIndex {
    /// Chunk and embed every section.
    ///
    /// Any embedding failure, empty section, duplicate chunk id, or
    /// inconsistent vector width aborts the build: an index is either
    /// complete or absent.
    pub async fn build(
        sections: &[PolicySection],
        chunking: &ChunkingConfig,
        embedder: Arc<dyn Embedder>,
    ) -> WardenResult<Self> {
        let mut seen = BTreeSet::new();
        let mut chunks = vec![];
        let mut width = None;

        for section in sections {
            let windows = chunk_section(section, chunking);
            if windows.is_empty() {
                return Err(WardenError::CorpusError {
                    source_name: "policies".to_string(),
                    reason: format!("section '{}' has no content", section.id),
                });
            }

            for window in windows {
                if !seen.insert(window.id.clone()) {
                    return Err(WardenError::CorpusError {
                        source_name: "policies".to_string(),
                        reason: format!("duplicate chunk id '{}'", window.id),
                    });
                }

                let embedding = embedder
                    .embed(&format!("{}\n{}", window.title, window.text))
                    .await
                    .map_err(|e| WardenError::EmbeddingFailed {
                        reason: format!("chunk '{}': {}", window.id, e),
                    })?;
                match width {
                    None if embedding.is_empty() => {
                        return Err(WardenError::EmbeddingFailed {
                            reason: format!("chunk '{}' produced an empty embedding", window.id),
                        });
                    }
                    None => width = Some(embedding.len()),
                    Some(w) if w != embedding.len() => {
                        return Err(WardenError::EmbeddingFailed {
                            reason: format!(
                                "chunk '{}' has {} dimensions, expected {}",
                                window.id,
                                embedding.len(),
                                w
                            ),
                        });
                    }
                    Some(_) => {}
                }

                chunks.push(PolicyChunk {
                    id: window.id,
                    section_ref: window.section_ref,
                    title: window.title,
                    text: window.text,
                    embedding,
                });
            }
        }

        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            sections = sections.len(),
            chunks = chunks.len(),
            "retrieval index built"
        );
        Ok(Self { chunks, embedder })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, id: &str) -> Option<&PolicyChunk> {
        self.chunks
            .binary_search_by(|c| c.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.chunks[i])
    }

    /// Return at most `top_k` chunks scoring at least `threshold` for `query`.
    ///
    /// A query-time embedding failure is logged and yields an empty result.
    pub async fn retrieve(&self, query: &str, top_k: usize, threshold: f32) -> Vec<ScoredChunk> {
        if top_k == 0 || self.chunks.is_empty() {
            return vec![];
        }

        let query_vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; returning no chunks");
                return vec![];
            }
        };

        let mut scored: Vec<(f32, &PolicyChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (similarity(&query_vector, &chunk.embedding), chunk))
            .collect();
        // `chunks` is sorted by id, so a stable sort on score alone keeps
        // equal scores in ascending id order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let results: Vec<ScoredChunk> = scored
            .into_iter()
            .take(top_k.saturating_mul(2))
            .filter(|(score, _)| *score >= threshold)
            .take(top_k)
            .map(|(score, chunk)| ScoredChunk::from_chunk(chunk, score))
            .collect();

        debug!(
            top_k,
            threshold,
            returned = results.len(),
            best = results.first().map(|c| c.score),
            "retrieval complete"
        );
        results
    }
}

/// Cosine similarity clamped to `[0, 1]`. Zero-length vectors, mismatched
/// widths, and non-finite results score 0.
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
