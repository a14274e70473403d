//! kbsearch-text
//!
//! Language-aware tokenization, recursive text chunking, and the in-memory
//! lexical index with BM25 scoring. Everything here is synchronous and
//! side-effect-free; the hybrid facade owns locking and snapshots.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod bm25;
pub mod splitter;
pub mod tokenize;

pub use bm25::{Bm25Config, CorpusStats, IndexedDocument, LexicalIndex};
pub use splitter::{SplitterConfig, TextSplitter};
pub use tokenize::tokenize;
