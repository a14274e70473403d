//! Reciprocal Rank Fusion with normalized score blending.
//!
//! Per input list: `w * (1/(k + rank + 1) + normalized_raw_score)`. A
//! document missing from a list contributes 0 for that list, it is never
//! penalized. Ties break by original BM25 rank, then by document id.
//!
//! The raw-score normalization constants are heuristics, not invariants:
//! BM25 scores are divided by a configured ceiling (they are unbounded in
//! principle), cosine scores are clamped into [0, 1], keyword counts are
//! scaled by the list maximum.

use kbsearch_core::error::{Error, Result};
use kbsearch_core::types::{ComponentScores, SearchResult, SearchSource};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub vector: f32,
    pub bm25: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.4, bm25: 0.4, keyword: 0.2 }
    }
}

impl FusionWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("vector", self.vector), ("bm25", self.bm25), ("keyword", self.keyword)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "fusion weight '{name}' must be >= 0, got {w}"
                )));
            }
        }
        let sum = self.vector + self.bm25 + self.keyword;
        if sum <= 0.0 {
            return Err(Error::InvalidConfig(format!("fusion weights must sum > 0, got {sum}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    /// RRF dampening constant. 60 is the conventional robust default.
    pub rrf_k: f32,
    /// Assumed BM25 score ceiling for normalization. Tunable, not a bound.
    pub bm25_norm: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { weights: FusionWeights::default(), rrf_k: 60.0, bm25_norm: 20.0 }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(Error::InvalidConfig(format!("rrf_k must be > 0, got {}", self.rrf_k)));
        }
        if !self.bm25_norm.is_finite() || self.bm25_norm <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "bm25_norm must be > 0, got {}",
                self.bm25_norm
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Fused {
    score: f32,
    components: ComponentScores,
    matched_terms: Vec<String>,
}

/// Fuse up to three ranked lists into one, sorted descending by fused
/// score. Every output result carries `source: Hybrid`.
pub fn fuse(
    config: &FusionConfig,
    vector: &[SearchResult],
    bm25: &[SearchResult],
    keyword: &[SearchResult],
) -> Vec<SearchResult> {
    let mut acc: HashMap<String, Fused> = HashMap::new();
    let k = config.rrf_k;

    let keyword_max = keyword.iter().map(|r| r.score).fold(0.0f32, f32::max);

    for (rank, r) in vector.iter().enumerate() {
        let raw = r.score.clamp(0.0, 1.0);
        let entry = acc.entry(r.document_id.clone()).or_default();
        entry.score += config.weights.vector * (1.0 / (k + rank as f32 + 1.0) + raw);
        entry.components.vector = Some(r.score);
        merge_terms(&mut entry.matched_terms, &r.matched_terms);
    }
    for (rank, r) in bm25.iter().enumerate() {
        let raw = (r.score / config.bm25_norm).clamp(0.0, 1.0);
        let entry = acc.entry(r.document_id.clone()).or_default();
        entry.score += config.weights.bm25 * (1.0 / (k + rank as f32 + 1.0) + raw);
        entry.components.bm25 = Some(r.score);
        merge_terms(&mut entry.matched_terms, &r.matched_terms);
    }
    for (rank, r) in keyword.iter().enumerate() {
        let raw = if keyword_max > 0.0 { r.score / keyword_max } else { 0.0 };
        let entry = acc.entry(r.document_id.clone()).or_default();
        entry.score += config.weights.keyword * (1.0 / (k + rank as f32 + 1.0) + raw);
        entry.components.keyword = Some(r.score);
        merge_terms(&mut entry.matched_terms, &r.matched_terms);
    }

    let mut out: Vec<SearchResult> = acc
        .into_iter()
        .map(|(id, fused)| {
            let mut r = SearchResult::new(id, fused.score, SearchSource::Hybrid);
            r.component_scores = fused.components;
            r.matched_terms = fused.matched_terms;
            r
        })
        .collect();

    let bm25_rank: HashMap<&str, usize> =
        bm25.iter().enumerate().map(|(i, r)| (r.document_id.as_str(), i)).collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = bm25_rank.get(a.document_id.as_str()).copied().unwrap_or(usize::MAX);
                let rb = bm25_rank.get(b.document_id.as_str()).copied().unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    out
}

fn merge_terms(into: &mut Vec<String>, from: &[String]) {
    for t in from {
        if !into.contains(t) {
            into.push(t.clone());
        }
    }
}
