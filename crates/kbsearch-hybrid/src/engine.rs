//! Retrieval facade.
//!
//! Owns an immutable corpus snapshot behind a `parking_lot::RwLock<Arc<_>>`:
//! readers clone the Arc and never block each other, writers build a fresh
//! snapshot and swap it in whole, so no search ever observes a half-rebuilt
//! index. The embedding call is the only suspending operation; it runs on
//! the blocking pool under a timeout, and BM25/keyword scoring proceeds
//! regardless of its fate.

use crate::fusion::{fuse, FusionConfig};
use kbsearch_core::error::{Error, Result};
use kbsearch_core::traits::{DocumentSource, EmbeddingProvider, KvStore, QueryRewriter};
use kbsearch_core::types::{
    ComponentScores, Document, SearchMode, SearchOptions, SearchResult, SearchSource,
};
use kbsearch_text::bm25::{Bm25Config, LexicalIndex};
use kbsearch_text::tokenize;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kbsearch_vector::cache::{CacheConfig, EmbeddingCache};
use kbsearch_vector::search::cosine_similarity;
use kbsearch_vector::VectorSearcher;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub bm25: Bm25Config,
    pub fusion: FusionConfig,
    pub cache: CacheConfig,
    /// Similarity floor in pure vector mode.
    pub vector_threshold: f32,
    /// Looser floor when the vector list is one hybrid signal among several.
    pub hybrid_vector_threshold: f32,
    pub embed_timeout: Duration,
    /// Re-score this many fused results against the query vector. 0 = off.
    pub rerank_top_n: usize,
    /// Character budget for `build_context`.
    pub context_budget: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            bm25: Bm25Config::default(),
            fusion: FusionConfig::default(),
            cache: CacheConfig::default(),
            vector_threshold: 0.5,
            hybrid_vector_threshold: 0.1,
            embed_timeout: Duration::from_secs(10),
            rerank_top_n: 0,
            context_budget: 2000,
        }
    }
}

impl EngineOptions {
    fn validate(&self) -> Result<()> {
        self.bm25.validate()?;
        self.fusion.validate()?;
        for (name, t) in [
            ("vector_threshold", self.vector_threshold),
            ("hybrid_vector_threshold", self.hybrid_vector_threshold),
        ] {
            if !t.is_finite() || !(-1.0..=1.0).contains(&t) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in [-1, 1], got {t}"
                )));
            }
        }
        if self.embed_timeout.is_zero() {
            return Err(Error::InvalidConfig("embed_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Immutable corpus snapshot. `docs` keeps insertion order for stable
/// tie-breaks; `by_id` resolves results back to their documents.
#[derive(Clone)]
struct Corpus {
    index: LexicalIndex,
    docs: Vec<Document>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    fn empty(bm25: Bm25Config) -> Result<Self> {
        Ok(Self { index: LexicalIndex::new(bm25)?, docs: Vec::new(), by_id: HashMap::new() })
    }

    fn embed_text(doc: &Document) -> String {
        if doc.title.is_empty() {
            doc.content.clone()
        } else {
            format!("{}\n{}", doc.title, doc.content)
        }
    }

    fn embed_pairs(&self) -> Vec<(String, String)> {
        self.docs.iter().map(|d| (d.id.clone(), Self::embed_text(d))).collect()
    }
}

pub struct RetrievalEngine {
    options: EngineOptions,
    searcher: Arc<VectorSearcher>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    corpus: RwLock<Arc<Corpus>>,
    // Serializes index_documents/add/remove/clear against each other.
    write_lock: Mutex<()>,
}

impl RetrievalEngine {
    pub fn new(
        options: EngineOptions,
        provider: Arc<dyn EmbeddingProvider>,
        kv: Option<Arc<dyn KvStore>>,
        rewriter: Option<Arc<dyn QueryRewriter>>,
    ) -> Result<Self> {
        options.validate()?;
        let cache = Arc::new(EmbeddingCache::new(options.cache.clone(), kv));
        let searcher = Arc::new(VectorSearcher::new(provider, cache));
        let corpus = RwLock::new(Arc::new(Corpus::empty(options.bm25)?));
        Ok(Self { options, searcher, rewriter, corpus, write_lock: Mutex::new(()) })
    }

    pub fn document_count(&self) -> usize {
        self.corpus.read().docs.len()
    }

    pub fn get_document(&self, id: &str) -> Option<Document> {
        let corpus = self.corpus.read().clone();
        corpus.by_id.get(id).map(|&i| corpus.docs[i].clone())
    }

    /// Clear-then-rebuild over a full corpus. The new snapshot is built
    /// off to the side and swapped in atomically.
    pub fn index_documents(&self, docs: &[Document]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut corpus = Corpus::empty(self.options.bm25)?;
        for doc in docs {
            Self::push_doc(&mut corpus, doc);
        }
        tracing::debug!(documents = corpus.docs.len(), "index rebuilt");
        *self.corpus.write() = Arc::new(corpus);
        Ok(())
    }

    /// Pull a snapshot from a document source and index it.
    pub fn index_from_source(&self, source: &dyn DocumentSource) -> anyhow::Result<usize> {
        let docs = source.list_documents()?;
        self.index_documents(&docs)?;
        Ok(docs.len())
    }

    /// Single-document delta on a cloned snapshot; only the new document
    /// is tokenized. Re-adding an id replaces it in place.
    pub fn add_document(&self, doc: &Document) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut next = (**self.corpus.read()).clone();
        next.index.add_document(doc);
        match next.by_id.get(&doc.id) {
            Some(&i) => next.docs[i] = doc.clone(),
            None => {
                next.by_id.insert(doc.id.clone(), next.docs.len());
                next.docs.push(doc.clone());
            }
        }
        *self.corpus.write() = Arc::new(next);
        Ok(())
    }

    /// Unknown ids are a no-op.
    pub fn remove_document(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let current = self.corpus.read().clone();
        if !current.by_id.contains_key(id) {
            return Ok(());
        }
        let mut next = (*current).clone();
        next.index.remove_document(id);
        if let Some(pos) = next.by_id.remove(id) {
            next.docs.remove(pos);
            // Positions after the removed slot shift down by one.
            for (i, d) in next.docs.iter().enumerate().skip(pos) {
                next.by_id.insert(d.id.clone(), i);
            }
        }
        *self.corpus.write() = Arc::new(next);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        *self.corpus.write() = Arc::new(Corpus::empty(self.options.bm25)?);
        Ok(())
    }

    fn push_doc(corpus: &mut Corpus, doc: &Document) {
        corpus.index.add_document(doc);
        corpus.by_id.insert(doc.id.clone(), corpus.docs.len());
        corpus.docs.push(doc.clone());
    }

    /// Run a query. Never fails because one ranking signal was
    /// unavailable; only a dimension mismatch (a caller bug) surfaces.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let corpus = self.corpus.read().clone();
        if query.trim().is_empty() || corpus.docs.is_empty() {
            return Ok(Vec::new());
        }

        let variants = self.query_variants(query, opts);
        let lists = futures::future::join_all(
            variants.iter().map(|v| self.search_one(v, query, &corpus, opts)),
        )
        .await;

        // Variants merge by best score per document.
        let mut merged: HashMap<String, SearchResult> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for list in lists {
            for r in list? {
                match merged.get_mut(&r.document_id) {
                    Some(existing) => {
                        if r.score > existing.score {
                            *existing = r;
                        }
                    }
                    None => {
                        order.push(r.document_id.clone());
                        merged.insert(r.document_id.clone(), r);
                    }
                }
            }
        }

        let mut results: Vec<SearchResult> = Vec::with_capacity(merged.len());
        for id in order {
            if let Some(r) = merged.remove(&id) {
                results.push(r);
            }
        }
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        results.truncate(opts.limit);
        Ok(results)
    }

    /// Expand the query through the rewriter when requested. Rewrite
    /// failures are logged and fall back to the original query alone.
    fn query_variants(&self, query: &str, opts: &SearchOptions) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        let (Some(rewriter), Some(method)) = (self.rewriter.as_deref(), opts.rewrite) else {
            return variants;
        };
        match rewriter.rewrite(query, method) {
            Ok(extra) => {
                for v in extra {
                    let v = v.trim().to_string();
                    if !v.is_empty() && !variants.contains(&v) {
                        variants.push(v);
                    }
                }
            }
            Err(e) => tracing::warn!("query rewrite failed, using original query: {e}"),
        }
        variants
    }

    async fn search_one(
        &self,
        variant: &str,
        original_query: &str,
        corpus: &Arc<Corpus>,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        match opts.mode {
            SearchMode::Bm25 => Ok(corpus.index.search(variant, opts.limit, opts.threshold)),
            SearchMode::Keyword => Ok(keyword_search(corpus, variant, opts.limit)),
            SearchMode::Vector => {
                let threshold = opts.threshold.unwrap_or(self.options.vector_threshold);
                match self.vector_branch(variant, corpus, opts.limit, threshold).await? {
                    Some(outcome) => Ok(outcome.results),
                    // Provider down: the lexical signal is all we have left.
                    None => Ok(corpus.index.search(variant, opts.limit, opts.threshold)),
                }
            }
            SearchMode::Hybrid => {
                self.hybrid_search(variant, original_query, corpus, opts).await
            }
        }
    }

    async fn hybrid_search(
        &self,
        variant: &str,
        original_query: &str,
        corpus: &Arc<Corpus>,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        // Fetch more than `limit` from each signal so fusion has overlap
        // to work with.
        let fetch = (opts.limit * 3).max(10);
        let bm25_results = corpus.index.search(variant, fetch, None);
        let keyword_results = keyword_search(corpus, variant, fetch);

        let threshold = self.options.hybrid_vector_threshold;
        let vector_outcome = self.vector_branch(variant, corpus, fetch, threshold).await?;
        let vector_results =
            vector_outcome.as_ref().map(|o| o.results.clone()).unwrap_or_default();

        let mut fused =
            fuse(&self.options.fusion, &vector_results, &bm25_results, &keyword_results);
        fused.truncate(opts.limit.max(self.options.rerank_top_n));

        if self.options.rerank_top_n > 0 {
            if let Some(outcome) = &vector_outcome {
                // Second pass: the rerank always compares against the
                // caller's original query, not a rewrite variant.
                let query_vec = if variant == original_query {
                    Some(outcome.query_vec.clone())
                } else {
                    self.embed_blocking(original_query.to_string()).await
                };
                if let Some(query_vec) = query_vec {
                    rerank(&mut fused, &query_vec, &outcome.doc_vecs, self.options.rerank_top_n);
                }
            }
        }

        if let Some(floor) = opts.threshold {
            fused.retain(|r| r.score > floor);
        }
        Ok(fused)
    }

    /// Run the vector signal on the blocking pool under a timeout.
    /// `Ok(None)` means the signal is unavailable (provider failure,
    /// timeout) and the caller should degrade; dimension mismatches
    /// propagate.
    async fn vector_branch(
        &self,
        query: &str,
        corpus: &Arc<Corpus>,
        limit: usize,
        threshold: f32,
    ) -> Result<Option<VectorOutcome>> {
        let searcher = self.searcher.clone();
        let pairs = corpus.embed_pairs();
        let query = query.to_string();
        let task = tokio::task::spawn_blocking(move || -> Result<VectorOutcome> {
            let query_vec = searcher.embed_cached(&query)?;
            let mut doc_vecs = HashMap::new();
            let mut scored: Vec<(usize, f32)> = Vec::new();
            for (i, (id, content)) in pairs.iter().enumerate() {
                let v = searcher.embed_cached(content)?;
                let sim = cosine_similarity(&query_vec, &v)?;
                doc_vecs.insert(id.clone(), v);
                if sim > threshold {
                    scored.push((i, sim));
                }
            }
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            let results = scored
                .into_iter()
                .map(|(i, sim)| {
                    let mut r = SearchResult::new(pairs[i].0.clone(), sim, SearchSource::Vector);
                    r.component_scores =
                        ComponentScores { vector: Some(sim), ..Default::default() };
                    r
                })
                .collect();
            Ok(VectorOutcome { query_vec, doc_vecs, results })
        });

        match tokio::time::timeout(self.options.embed_timeout, task).await {
            Ok(Ok(Ok(outcome))) => Ok(Some(outcome)),
            Ok(Ok(Err(e @ Error::DimensionMismatch { .. }))) => Err(e),
            Ok(Ok(Err(e))) => {
                tracing::warn!("vector signal unavailable, degrading: {e}");
                Ok(None)
            }
            Ok(Err(join_err)) => {
                tracing::warn!("vector task failed, degrading: {join_err}");
                Ok(None)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.options.embed_timeout, "embedding timed out, degrading");
                Ok(None)
            }
        }
    }

    async fn embed_blocking(&self, text: String) -> Option<Vec<f32>> {
        let searcher = self.searcher.clone();
        let task = tokio::task::spawn_blocking(move || searcher.embed_cached(&text));
        match tokio::time::timeout(self.options.embed_timeout, task).await {
            Ok(Ok(Ok(v))) => Some(v),
            _ => None,
        }
    }

    /// Format the top results into a bounded text block for prompt
    /// construction. The character budget is divided evenly across
    /// results; truncated content ends with an ellipsis marker.
    pub async fn build_context(&self, query: &str, top_k: usize) -> Result<String> {
        let opts = SearchOptions { limit: top_k, ..SearchOptions::default() };
        let results = self.search(query, &opts).await?;
        if results.is_empty() {
            return Ok(String::new());
        }
        let corpus = self.corpus.read().clone();
        let per_result = self.options.context_budget / results.len();
        let mut sections = Vec::with_capacity(results.len());
        for (i, r) in results.iter().enumerate() {
            let Some(&idx) = corpus.by_id.get(&r.document_id) else {
                continue;
            };
            let doc = &corpus.docs[idx];
            let header = if doc.title.is_empty() {
                format!("[{}] ", i + 1)
            } else {
                format!("[{}] {}\n", i + 1, doc.title)
            };
            let body_budget = per_result.saturating_sub(header.chars().count());
            sections.push(format!("{header}{}", truncate_chars(&doc.content, body_budget)));
        }
        Ok(sections.join("\n\n"))
    }
}

struct VectorOutcome {
    query_vec: Vec<f32>,
    doc_vecs: HashMap<String, Vec<f32>>,
    results: Vec<SearchResult>,
}

/// Blend fresh query similarity 60/40 into the fused score for the top-N,
/// then restore descending order. Pure quality refinement.
fn rerank(
    fused: &mut [SearchResult],
    query_vec: &[f32],
    doc_vecs: &HashMap<String, Vec<f32>>,
    top_n: usize,
) {
    let n = top_n.min(fused.len());
    for r in fused[..n].iter_mut() {
        let Some(doc_vec) = doc_vecs.get(&r.document_id) else {
            continue;
        };
        let Ok(sim) = cosine_similarity(query_vec, doc_vec) else {
            continue;
        };
        r.score = 0.6 * sim.clamp(0.0, 1.0) + 0.4 * r.score;
        r.component_scores.vector = Some(sim);
    }
    fused[..n].sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}

/// Case-insensitive substring matcher, the third hybrid signal. Scores by
/// total occurrence count of the query tokens.
fn keyword_search(corpus: &Corpus, query: &str, limit: usize) -> Vec<SearchResult> {
    let tokens = {
        let mut seen = std::collections::HashSet::new();
        tokenize(query).into_iter().filter(|t| seen.insert(t.clone())).collect::<Vec<_>>()
    };
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f32, Vec<String>)> = Vec::new();
    for (i, doc) in corpus.docs.iter().enumerate() {
        let haystack = format!("{}\n{}", doc.title, doc.content).to_lowercase();
        let mut count = 0usize;
        let mut matched = Vec::new();
        for t in &tokens {
            let occurrences = haystack.matches(t.as_str()).count();
            if occurrences > 0 {
                matched.push(t.clone());
                count += occurrences;
            }
        }
        if count > 0 {
            scored.push((i, count as f32, matched));
        }
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
        .into_iter()
        .map(|(i, score, matched)| {
            let mut r = SearchResult::new(corpus.docs[i].id.clone(), score, SearchSource::Keyword);
            r.component_scores = ComponentScores { keyword: Some(score), ..Default::default() };
            r.matched_terms = matched;
            r
        })
        .collect()
}

fn truncate_chars(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return text.to_string();
    }
    let keep = budget.saturating_sub(1);
    let mut out: String = chars[..keep].iter().collect();
    out.push('…');
    out
}
