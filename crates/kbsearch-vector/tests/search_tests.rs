use kbsearch_core::error::Error;
use kbsearch_core::traits::EmbeddingProvider;
use kbsearch_embed::HashEmbedder;
use kbsearch_vector::cache::{CacheConfig, EmbeddingCache};
use kbsearch_vector::VectorSearcher;
use std::sync::Arc;

fn searcher() -> (VectorSearcher, Arc<EmbeddingCache>) {
    let cache = Arc::new(EmbeddingCache::new(CacheConfig::default(), None));
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(128));
    (VectorSearcher::new(provider, cache.clone()), cache)
}

fn corpus() -> Vec<(String, String)> {
    vec![
        ("d1".to_string(), "rust memory safety and ownership".to_string()),
        ("d2".to_string(), "growing tomatoes in the garden".to_string()),
        ("d3".to_string(), "rust ownership borrowing lifetimes".to_string()),
    ]
}

#[test]
fn exact_text_ranks_first() {
    let (s, _) = searcher();
    let docs = corpus();
    let results = s.search("rust memory safety and ownership", &docs, 10, 0.0).expect("search");
    assert!(!results.is_empty());
    assert_eq!(results[0].document_id, "d1");
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[test]
fn empty_query_returns_nothing() {
    let (s, _) = searcher();
    assert!(s.search("", &corpus(), 10, 0.0).expect("search").is_empty());
    assert!(s.search("rust", &[], 10, 0.0).expect("search").is_empty());
}

#[test]
fn threshold_filters_unrelated_documents() {
    let (s, _) = searcher();
    let results = s.search("rust ownership", &corpus(), 10, 0.5).expect("search");
    assert!(results.iter().all(|r| r.score > 0.5));
    assert!(results.iter().all(|r| r.document_id != "d2"));
}

#[test]
fn repeated_searches_hit_the_cache() {
    let (s, cache) = searcher();
    let docs = corpus();
    s.search("rust ownership", &docs, 10, 0.0).expect("first");
    let misses_after_first = cache.stats().misses;
    s.search("rust ownership", &docs, 10, 0.0).expect("second");
    // Second pass embeds nothing new.
    assert_eq!(cache.stats().misses, misses_after_first);
    assert!(cache.stats().hits > 0);
}

#[test]
fn provider_dimension_lies_surface_as_mismatch() {
    struct LyingProvider;
    impl EmbeddingProvider for LyingProvider {
        fn id(&self) -> &str {
            "liar:d8"
        }
        fn dimension(&self) -> usize {
            8
        }
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0; 4])
        }
    }
    let cache = Arc::new(EmbeddingCache::new(CacheConfig::default(), None));
    let s = VectorSearcher::new(Arc::new(LyingProvider), cache);
    assert!(matches!(
        s.search("q", &corpus(), 10, 0.0),
        Err(Error::DimensionMismatch { expected: 8, actual: 4 })
    ));
}

#[test]
fn failing_provider_surfaces_as_provider_error() {
    struct FailingProvider;
    impl EmbeddingProvider for FailingProvider {
        fn id(&self) -> &str {
            "broken:d8"
        }
        fn dimension(&self) -> usize {
            8
        }
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }
    }
    let cache = Arc::new(EmbeddingCache::new(CacheConfig::default(), None));
    let s = VectorSearcher::new(Arc::new(FailingProvider), cache);
    assert!(matches!(s.search("q", &corpus(), 10, 0.0), Err(Error::Provider(_))));
}
