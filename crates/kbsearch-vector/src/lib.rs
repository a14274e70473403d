//! kbsearch-vector
//!
//! Content-addressed embedding cache and cosine-similarity ranking. The
//! cache is long-lived and independent of any corpus snapshot; entries die
//! only by hash mismatch, explicit delete, LRU eviction, or TTL expiry.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod cache;
pub mod codec;
pub mod search;

pub use cache::{CacheConfig, CacheStats, EmbeddingCache};
pub use search::{cosine_similarity, VectorSearcher};
