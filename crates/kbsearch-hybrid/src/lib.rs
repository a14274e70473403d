//! kbsearch-hybrid
//!
//! Reciprocal-rank fusion of the lexical, vector, and keyword signals, and
//! the retrieval facade that owns the corpus snapshot, the fallback policy,
//! and context assembly for prompt construction.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod engine;
pub mod fusion;

pub use engine::{EngineOptions, RetrievalEngine};
pub use fusion::{fuse, FusionConfig, FusionWeights};
