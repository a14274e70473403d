//! In-memory lexical index and BM25 scoring.
//!
//! The index keeps insertion order so that equal scores break ties
//! deterministically. `index_documents` is clear-then-rebuild;
//! `add_document`/`remove_document` adjust corpus stats in place.

use crate::tokenize::tokenize;
use kbsearch_core::error::{Error, Result};
use kbsearch_core::types::{ComponentScores, Document, SearchResult, SearchSource};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    /// Term-frequency saturation. Default 1.5.
    pub k1: f32,
    /// Document-length normalization strength. Default 0.75.
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Config {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::InvalidConfig(format!("k1 must be >= 0, got {}", self.k1)));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(Error::InvalidConfig(format!("b must be in [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

/// Engine-owned derivation of a [`Document`], replaced wholesale on
/// re-index.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub tokens: Vec<String>,
    pub term_frequency: HashMap<String, u32>,
    pub length: usize,
}

impl IndexedDocument {
    fn from_document(doc: &Document) -> Self {
        let text = format!("{} {}", doc.title, doc.content);
        let tokens = tokenize(&text);
        let mut term_frequency: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *term_frequency.entry(t.clone()).or_insert(0) += 1;
        }
        let length = tokens.len();
        Self { id: doc.id.clone(), tokens, term_frequency, length }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    pub document_frequency: HashMap<String, u32>,
    pub total_documents: usize,
    pub avg_doc_length: f32,
}

#[derive(Debug, Clone)]
pub struct LexicalIndex {
    config: Bm25Config,
    docs: Vec<IndexedDocument>,
    by_id: HashMap<String, usize>,
    stats: CorpusStats,
    total_length: usize,
}

impl LexicalIndex {
    pub fn new(config: Bm25Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            docs: Vec::new(),
            by_id: HashMap::new(),
            stats: CorpusStats::default(),
            total_length: 0,
        })
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&IndexedDocument> {
        self.by_id.get(id).map(|&i| &self.docs[i])
    }

    /// Clear-then-rebuild over a full corpus snapshot.
    pub fn index_documents(&mut self, docs: &[Document]) {
        self.clear();
        for doc in docs {
            self.add_document(doc);
        }
    }

    /// Incremental insert; re-adding an existing id replaces it.
    pub fn add_document(&mut self, doc: &Document) {
        if self.by_id.contains_key(&doc.id) {
            self.remove_document(&doc.id);
        }
        let indexed = IndexedDocument::from_document(doc);
        for term in indexed.term_frequency.keys() {
            *self.stats.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_length += indexed.length;
        self.by_id.insert(indexed.id.clone(), self.docs.len());
        self.docs.push(indexed);
        self.recompute_stats();
    }

    /// Unknown ids are a no-op.
    pub fn remove_document(&mut self, id: &str) {
        let Some(pos) = self.by_id.remove(id) else {
            return;
        };
        let removed = self.docs.remove(pos);
        for term in removed.term_frequency.keys() {
            if let Some(df) = self.stats.document_frequency.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.stats.document_frequency.remove(term);
                }
            }
        }
        self.total_length -= removed.length;
        // Positions after the removed slot shift down by one.
        for (i, doc) in self.docs.iter().enumerate().skip(pos) {
            self.by_id.insert(doc.id.clone(), i);
        }
        self.recompute_stats();
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.by_id.clear();
        self.stats = CorpusStats::default();
        self.total_length = 0;
    }

    fn recompute_stats(&mut self) {
        self.stats.total_documents = self.docs.len();
        self.stats.avg_doc_length = if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.docs.len() as f32
        };
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.stats.total_documents as f32;
        let df = self.stats.document_frequency.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25 score of one document for a set of query terms. Terms absent
    /// from the document contribute 0.
    pub fn score(&self, query_terms: &[String], doc: &IndexedDocument) -> f32 {
        let k1 = self.config.k1;
        let b = self.config.b;
        // Floor avoids division by zero on an empty corpus.
        let avgdl = self.stats.avg_doc_length.max(1.0);
        let mut total = 0.0;
        for term in query_terms {
            let Some(&tf) = doc.term_frequency.get(term) else {
                continue;
            };
            let tf = tf as f32;
            let norm = tf + k1 * (1.0 - b + b * doc.length as f32 / avgdl);
            total += self.idf(term) * tf * (k1 + 1.0) / norm;
        }
        total
    }

    /// Tokenize, score every document, keep positive scores above the
    /// optional threshold, sort descending (stable: insertion order breaks
    /// ties) and truncate to `limit`.
    pub fn search(&self, query: &str, limit: usize, threshold: Option<f32>) -> Vec<SearchResult> {
        let terms = unique_terms(&tokenize(query));
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }
        let floor = threshold.unwrap_or(0.0);
        let mut scored: Vec<(usize, f32)> = Vec::new();
        for (i, doc) in self.docs.iter().enumerate() {
            let s = self.score(&terms, doc);
            if s > 0.0 && s > floor {
                scored.push((i, s));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
            .into_iter()
            .map(|(i, s)| {
                let doc = &self.docs[i];
                let matched: Vec<String> = terms
                    .iter()
                    .filter(|t| doc.term_frequency.contains_key(*t))
                    .cloned()
                    .collect();
                let mut result = SearchResult::new(doc.id.clone(), s, SearchSource::Bm25);
                result.component_scores = ComponentScores { bm25: Some(s), ..Default::default() };
                result.matched_terms = matched;
                result
            })
            .collect()
    }
}

/// First occurrence wins; BM25 sums over distinct query terms.
fn unique_terms(tokens: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for t in tokens {
        if seen.insert(t.clone()) {
            out.push(t.clone());
        }
    }
    out
}
