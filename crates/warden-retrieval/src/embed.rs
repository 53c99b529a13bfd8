//! Deterministic feature-hashing embedder.
//!
//! `HashingEmbedder` lets the pipeline run without an embedding provider.
//! Lower-cased alphanumeric tokens (minus a short stopword list) and
//! adjacent-token bigrams are hashed with 64-bit FNV-1a into a fixed number
//! of signed buckets, and the result is L2-normalized. Equal text always
//! produces an equal vector, on every platform.

use async_trait::async_trait;

use warden_contracts::error::{WardenError, WardenResult};
use warden_core::traits::Embedder;

/// Default vector width.
pub const DEFAULT_DIMENSIONS: usize = 512;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "i", "if", "in",
    "is", "it", "me", "my", "of", "on", "or", "the", "this", "to", "we", "what", "with",
];

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> WardenResult<Self> {
        if dimensions == 0 {
            return Err(WardenError::ConfigError {
                reason: "embedding dimensions must be positive".to_string(),
            });
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Synchronous core of `embed`.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = tokens(text);
        let mut vector = vec![0.0f32; self.dimensions];

        let bigrams = tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1]));
        for feature in tokens.iter().cloned().chain(bigrams) {
            let hash = fnv1a(feature.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> WardenResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
