use crate::types::{Document, RewriteMethod};

/// Pull-based snapshot of a knowledge-base store, read once at index time.
pub trait DocumentSource: Send + Sync {
    fn list_documents(&self) -> anyhow::Result<Vec<Document>>;
}

/// Maps text to a fixed-length vector. Implementations (TF-IDF fallback,
/// local model, remote API) are interchangeable; given the same text and
/// the same `id()`, outputs must be reproducible enough to cache-hit.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `tfidf:d256`).
    /// Cache entries are never shared across ids.
    fn id(&self) -> &str;
    /// Embedding dimensionality.
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Key-value persistence used by the embedding cache and vocabulary
/// statistics to survive process restarts. Absence of a backing store
/// degrades to memory-only operation.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Optional LLM-backed query expansion. Failures must be swallowed by the
/// caller and fall back to the original query.
pub trait QueryRewriter: Send + Sync {
    fn rewrite(&self, query: &str, method: RewriteMethod) -> anyhow::Result<Vec<String>>;
}
