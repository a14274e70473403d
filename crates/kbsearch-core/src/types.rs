//! Domain types shared by the lexical and vector engines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DocId = String;
pub type Meta = HashMap<String, String>;

/// A source record supplied by the caller. The engine only reads it
/// during indexing and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), content: content.into() }
    }
}

/// A bounded span of a longer document produced by the text splitter.
///
/// Chunks are independent and ordered; `chunk_index`/`total_chunks` locate
/// the chunk within its parent, `start_offset`/`end_offset` (when produced
/// by the offset-tracking variant) point back into the original text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub start_offset: Option<usize>,
    pub end_offset: Option<usize>,
    /// Carried over from the parent document (title, path, ...).
    #[serde(default)]
    pub extra: Meta,
}

/// Which ranking signal produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchSource {
    Bm25,
    Vector,
    Keyword,
    Hybrid,
}

/// Per-signal raw scores carried alongside the final score so callers can
/// inspect how a hybrid result was assembled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub bm25: Option<f32>,
    pub vector: Option<f32>,
    pub keyword: Option<f32>,
}

/// The minimal surface returned by every search mode. `score` is
/// mode-specific but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: DocId,
    pub score: f32,
    pub component_scores: ComponentScores,
    pub matched_terms: Vec<String>,
    pub source: SearchSource,
}

impl SearchResult {
    pub fn new(document_id: impl Into<String>, score: f32, source: SearchSource) -> Self {
        Self {
            document_id: document_id.into(),
            score,
            component_scores: ComponentScores::default(),
            matched_terms: Vec::new(),
            source,
        }
    }
}

/// Retrieval mode requested by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchMode {
    Bm25,
    Vector,
    Keyword,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

/// Per-query options. `threshold` overrides the mode's configured default
/// score floor when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: usize,
    pub mode: SearchMode,
    pub threshold: Option<f32>,
    pub rewrite: Option<RewriteMethod>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { limit: 10, mode: SearchMode::Hybrid, threshold: None, rewrite: None }
    }
}

/// Query-rewrite strategies understood by a [`crate::traits::QueryRewriter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RewriteMethod {
    MultiQuery,
    Hyde,
    StepBack,
}
