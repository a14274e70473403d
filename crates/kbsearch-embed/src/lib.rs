//! kbsearch-embed
//!
//! [`EmbeddingProvider`] implementations. The engine never trains models;
//! these providers map text to fixed-length vectors deterministically so
//! the content-hash cache can do its job. A remote/ONNX provider plugs in
//! through the same trait without touching the engine.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod hashing;
pub mod tfidf;

pub use hashing::HashEmbedder;
pub use tfidf::TfIdfEmbedder;

use kbsearch_core::error::{Error, Result};
use kbsearch_core::traits::{EmbeddingProvider, KvStore};
use std::sync::Arc;

/// Select a provider by configured name instead of string-typed branching
/// at call sites.
pub fn provider_from_name(
    name: &str,
    dimension: usize,
    kv: Option<Arc<dyn KvStore>>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match name {
        "tfidf" => Ok(Arc::new(TfIdfEmbedder::new(dimension, kv))),
        "hashing" => Ok(Arc::new(HashEmbedder::new(dimension))),
        other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}'"))),
    }
}
