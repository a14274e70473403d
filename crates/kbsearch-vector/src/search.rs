//! Cosine-similarity ranking over cached or freshly computed embeddings.

use crate::cache::EmbeddingCache;
use kbsearch_core::error::{Error, Result};
use kbsearch_core::traits::EmbeddingProvider;
use kbsearch_core::types::{ComponentScores, SearchResult, SearchSource};
use std::sync::Arc;

/// `dot(a,b) / (‖a‖·‖b‖)`; 0 when either norm is 0 (never NaN).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Ranks `(id, content)` snapshots by similarity to a query, pulling
/// vectors through the cache and the provider.
pub struct VectorSearcher {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
}

impl VectorSearcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Cache-through embedding. Provider failures become
    /// [`Error::Provider`]; a vector of the wrong length is a caller bug
    /// and surfaces as [`Error::DimensionMismatch`].
    pub fn embed_cached(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.provider.id();
        if let Some(v) = self.cache.get(text, model) {
            return Ok(v);
        }
        let v = self.provider.embed(text).map_err(|e| Error::Provider(e.to_string()))?;
        if v.len() != self.provider.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.provider.dimension(),
                actual: v.len(),
            });
        }
        self.cache.set(text, &v, model);
        Ok(v)
    }

    /// Embed the query once, rank every `(id, content)` pair, keep
    /// similarities above `threshold`, return the top `limit`.
    pub fn search(
        &self,
        query: &str,
        docs: &[(String, String)],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || docs.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_cached(query)?;
        let mut scored: Vec<(usize, f32)> = Vec::new();
        for (i, (_, content)) in docs.iter().enumerate() {
            let doc_vec = self.embed_cached(content)?;
            let sim = cosine_similarity(&query_vec, &doc_vec)?;
            if sim > threshold {
                scored.push((i, sim));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored
            .into_iter()
            .map(|(i, sim)| {
                let mut r = SearchResult::new(docs[i].0.clone(), sim, SearchSource::Vector);
                r.component_scores = ComponentScores { vector: Some(sim), ..Default::default() };
                r
            })
            .collect())
    }
}
