//! Mock embedder for tests and offline runs.
//!
//! Produces deterministic bag-of-words vectors: every lowercase word is
//! hashed into one of `dimensions` buckets, so texts sharing words end up
//! close to each other. Words are hashed with 64-bit FNV-1a, which is
//! fixed, so vectors stay comparable with snapshots written by older builds.
use async_trait::async_trait;

use super::Embedder;
use crate::error::ProviderError;

pub const MOCK_MODEL: &str = "mock-bag-of-words";

/// A mock embedder that produces deterministic vectors from word hashes.
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    /// Zero is raised to one.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous core shared by the trait methods.
    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for word in words {
            let bucket = (fnv1a(word.as_bytes()) % self.dimensions as u64) as usize;
            embedding[bucket] += 1.0;
        }

        // Texts without words still need a direction under cosine distance.
        if embedding.iter().all(|v| *v == 0.0) {
            embedding[0] = 1.0;
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        let inv = 1.0 / norm_sq.sqrt();
        for v in &mut embedding {
            *v *= inv;
        }

        embedding
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }
}
