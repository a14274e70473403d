//! TF-IDF fallback embedder.
//!
//! Keeps document-frequency statistics fitted from the indexed corpus and
//! projects tf-idf weights into a fixed number of hashed buckets. The
//! vocabulary survives restarts through the optional [`KvStore`].

use kbsearch_core::traits::{EmbeddingProvider, KvStore};
use kbsearch_text::tokenize;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

const VOCAB_KEY: &str = "tfidf:vocab:v1";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Vocabulary {
    document_frequency: HashMap<String, u32>,
    total_documents: u32,
}

pub struct TfIdfEmbedder {
    id: String,
    dimension: usize,
    vocab: RwLock<Vocabulary>,
    kv: Option<Arc<dyn KvStore>>,
}

impl TfIdfEmbedder {
    pub fn new(dimension: usize, kv: Option<Arc<dyn KvStore>>) -> Self {
        let vocab = kv
            .as_deref()
            .and_then(|store| match store.get(VOCAB_KEY) {
                Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                    .map_err(|e| tracing::warn!("discarding corrupt tfidf vocabulary: {e}"))
                    .ok(),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("could not load tfidf vocabulary: {e}");
                    None
                }
            })
            .unwrap_or_default();
        Self { id: format!("tfidf:d{dimension}"), dimension, vocab: RwLock::new(vocab), kv }
    }

    /// Update document-frequency statistics from a corpus snapshot.
    /// Called once at index time; persisted if a store is attached.
    pub fn fit(&self, texts: &[String]) {
        let mut vocab = Vocabulary::default();
        for text in texts {
            let mut seen = std::collections::HashSet::new();
            for token in tokenize(text) {
                if seen.insert(token.clone()) {
                    *vocab.document_frequency.entry(token).or_insert(0) += 1;
                }
            }
            vocab.total_documents += 1;
        }
        if let Some(store) = self.kv.as_deref() {
            match serde_json::to_vec(&vocab) {
                Ok(bytes) => {
                    if let Err(e) = store.set(VOCAB_KEY, &bytes) {
                        tracing::warn!("could not persist tfidf vocabulary: {e}");
                    }
                }
                Err(e) => tracing::warn!("could not serialize tfidf vocabulary: {e}"),
            }
        }
        *self.vocab.write() = vocab;
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        term.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }
}

impl EmbeddingProvider for TfIdfEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let tokens = tokenize(text);
        let mut tf: HashMap<String, u32> = HashMap::new();
        for t in tokens {
            *tf.entry(t).or_insert(0) += 1;
        }

        let vocab = self.vocab.read();
        let n = vocab.total_documents.max(1) as f32;
        let mut v = vec![0f32; self.dimension];
        for (term, count) in tf {
            let df = vocab.document_frequency.get(&term).copied().unwrap_or(0) as f32;
            let idf = (n / (df + 1.0)).ln() + 1.0;
            v[self.bucket(&term)] += count as f32 * idf;
        }
        drop(vocab);

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}
