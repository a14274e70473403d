//! SHA-256-keyed embedding cache with LRU eviction and TTL expiry.
//!
//! Entries are keyed by `(content hash, model id)` so providers never share
//! vectors. An optional [`KvStore`] makes entries survive restarts: writes
//! go through, misses fall back to the store, and any storage failure
//! degrades to a miss without surfacing to the caller.

use crate::codec::{decode_vector, encode_vector};
use kbsearch_core::traits::KvStore;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: usize,
    /// Entries idle longer than this are dropped by `cleanup`, and a `get`
    /// on an expired entry is a miss. `None` disables expiry.
    pub ttl: Option<Duration>,
    /// Fraction of `max_size` evicted in one batch to amortize eviction.
    pub evict_fraction: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: 1000, ttl: None, evict_fraction: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

struct Entry {
    vector: Vec<f32>,
    dimension: usize,
    access_count: u64,
    last_accessed: Instant,
    created_at: Instant,
}

struct Inner {
    entries: HashMap<(String, String), Entry>,
    stats: CacheStats,
}

pub struct EmbeddingCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
    kv: Option<Arc<dyn KvStore>>,
}

impl EmbeddingCache {
    pub fn new(config: CacheConfig, kv: Option<Arc<dyn KvStore>>) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner { entries: HashMap::new(), stats: CacheStats::default() }),
            kv,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kv_key(model: &str, hash: &str) -> String {
        format!("emb:{model}:{hash}")
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.config.ttl.is_some_and(|ttl| entry.last_accessed.elapsed() > ttl)
    }

    pub fn get(&self, content: &str, model: &str) -> Option<Vec<f32>> {
        let hash = content_hash(content);
        let key = (hash.clone(), model.to_string());
        let mut inner = self.inner.lock();

        let mut drop_expired = false;
        if let Some(entry) = inner.entries.get_mut(&key) {
            if self.config.ttl.is_some_and(|ttl| entry.last_accessed.elapsed() > ttl) {
                drop_expired = true;
            } else {
                entry.access_count += 1;
                entry.last_accessed = Instant::now();
                let vector = entry.vector.clone();
                inner.stats.hits += 1;
                return Some(vector);
            }
        }
        if drop_expired {
            inner.entries.remove(&key);
        }

        // Memory miss: try the backing store. Storage or decode failures
        // are logged and count as a miss.
        if let Some(store) = self.kv.as_deref() {
            match store.get(&Self::kv_key(model, &hash)) {
                Ok(Some(bytes)) => match decode_vector(&bytes) {
                    Ok(vector) => {
                        self.insert_locked(&mut inner, key, vector.clone(), false);
                        inner.stats.hits += 1;
                        return Some(vector);
                    }
                    Err(e) => tracing::warn!("corrupt cached vector, treating as miss: {e}"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!("cache store read failed, treating as miss: {e}"),
            }
        }

        inner.stats.misses += 1;
        None
    }

    /// Insert a vector. Returns false only when the backing store rejected
    /// the write; the in-memory insert has still happened.
    pub fn set(&self, content: &str, vector: &[f32], model: &str) -> bool {
        let hash = content_hash(content);
        let key = (hash.clone(), model.to_string());
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, key, vector.to_vec(), true);
        drop(inner);

        if let Some(store) = self.kv.as_deref() {
            let encoded = encode_vector(vector);
            if let Err(e) = store.set(&Self::kv_key(model, &hash), &encoded) {
                tracing::warn!("cache store write failed: {e}");
                return false;
            }
        }
        true
    }

    fn insert_locked(
        &self,
        inner: &mut Inner,
        key: (String, String),
        vector: Vec<f32>,
        count_insert: bool,
    ) {
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            self.evict_locked(inner);
        }
        let now = Instant::now();
        let dimension = vector.len();
        inner.entries.insert(
            key,
            Entry { vector, dimension, access_count: 0, last_accessed: now, created_at: now },
        );
        if count_insert {
            inner.stats.inserts += 1;
        }
    }

    /// Drop the least-recently-accessed batch. Evicted entries are removed
    /// from the backing store too so the size bound holds across restarts.
    fn evict_locked(&self, inner: &mut Inner) {
        if inner.entries.is_empty() {
            return;
        }
        let batch = ((self.config.max_size as f32 * self.config.evict_fraction).ceil() as usize)
            .clamp(1, inner.entries.len());
        let mut by_age: Vec<((String, String), Instant)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        for (key, _) in by_age.into_iter().take(batch) {
            inner.entries.remove(&key);
            inner.stats.evictions += 1;
            self.kv_delete(&key.1, &key.0);
        }
    }

    fn kv_delete(&self, model: &str, hash: &str) {
        if let Some(store) = self.kv.as_deref() {
            if let Err(e) = store.delete(&Self::kv_key(model, hash)) {
                tracing::warn!("cache store delete failed: {e}");
            }
        }
    }

    pub fn has(&self, content: &str, model: &str) -> bool {
        let hash = content_hash(content);
        let key = (hash, model.to_string());
        let inner = self.inner.lock();
        inner.entries.get(&key).is_some_and(|e| !self.expired(e))
    }

    pub fn delete(&self, content: &str, model: &str) -> bool {
        let hash = content_hash(content);
        let key = (hash.clone(), model.to_string());
        let removed = self.inner.lock().entries.remove(&key).is_some();
        self.kv_delete(model, &hash);
        removed
    }

    /// Remove everything and reset the hit/miss/insert/eviction counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let keys: Vec<(String, String)> = inner.entries.keys().cloned().collect();
        inner.entries.clear();
        inner.stats = CacheStats::default();
        drop(inner);
        for (hash, model) in keys {
            self.kv_delete(&model, &hash);
        }
    }

    /// Sweep entries idle longer than the TTL window. Returns the count
    /// removed. No-op when expiry is disabled.
    pub fn cleanup(&self) -> usize {
        let Some(ttl) = self.config.ttl else {
            return 0;
        };
        let mut inner = self.inner.lock();
        let stale: Vec<(String, String)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.last_accessed.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            inner.entries.remove(key);
        }
        drop(inner);
        for (hash, model) in &stale {
            self.kv_delete(model, hash);
        }
        stale.len()
    }

    /// Equivalent to repeated `get` calls.
    pub fn get_many(&self, contents: &[String], model: &str) -> Vec<Option<Vec<f32>>> {
        contents.iter().map(|c| self.get(c, model)).collect()
    }

    /// Equivalent to repeated `set` calls; returns true when all writes
    /// fully succeeded.
    pub fn set_many(&self, items: &[(String, Vec<f32>)], model: &str) -> bool {
        let mut ok = true;
        for (content, vector) in items {
            ok &= self.set(content, vector, model);
        }
        ok
    }

    /// Access-count of an entry, for diagnostics.
    pub fn access_count(&self, content: &str, model: &str) -> Option<u64> {
        let key = (content_hash(content), model.to_string());
        self.inner.lock().entries.get(&key).map(|e| e.access_count)
    }

    /// Stored dimension of an entry, for diagnostics.
    pub fn dimension(&self, content: &str, model: &str) -> Option<usize> {
        let key = (content_hash(content), model.to_string());
        self.inner.lock().entries.get(&key).map(|e| e.dimension)
    }

    /// Age of an entry since insertion, for diagnostics.
    pub fn age(&self, content: &str, model: &str) -> Option<Duration> {
        let key = (content_hash(content), model.to_string());
        self.inner.lock().entries.get(&key).map(|e| e.created_at.elapsed())
    }
}
