//! Deterministic feature-hashing embedder.
//!
//! Buckets tokens into the vector by xxHash and L2-normalizes. No
//! vocabulary, no state; useful as a cheap default and in tests where
//! reproducibility matters more than semantic quality.

use kbsearch_core::traits::EmbeddingProvider;
use kbsearch_text::tokenize;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

pub struct HashEmbedder {
    id: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { id: format!("hashing:d{dimension}"), dimension }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0f32; self.dimension];
        for token in tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dimension;
            // Sign comes from the high bit of the same hash.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}
