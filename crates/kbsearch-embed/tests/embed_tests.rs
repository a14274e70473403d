use kbsearch_core::kv::MemoryKvStore;
use kbsearch_core::traits::{EmbeddingProvider, KvStore};
use kbsearch_embed::{provider_from_name, HashEmbedder, TfIdfEmbedder};
use std::sync::Arc;

fn l2(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn hash_embedder_is_deterministic_and_normalized() {
    let e = HashEmbedder::new(64);
    let a = e.embed("the quick brown fox").expect("embed");
    let b = e.embed("the quick brown fox").expect("embed");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!((l2(&a) - 1.0).abs() < 1e-5);
}

#[test]
fn different_texts_differ() {
    let e = HashEmbedder::new(64);
    let a = e.embed("rust ownership model").expect("embed");
    let b = e.embed("gardening in winter").expect("embed");
    assert_ne!(a, b);
}

#[test]
fn empty_text_is_zero_vector() {
    let e = HashEmbedder::new(16);
    let v = e.embed("").expect("embed");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn tfidf_downweights_corpus_wide_terms() {
    let e = TfIdfEmbedder::new(256, None);
    e.fit(&[
        "shared rare".to_string(),
        "shared filler".to_string(),
        "shared other".to_string(),
    ]);
    let argmax = |v: &[f32]| {
        v.iter().enumerate().max_by(|a, b| a.1.abs().total_cmp(&b.1.abs())).map(|(i, _)| i)
    };
    let shared_idx = argmax(&e.embed("shared").expect("embed")).expect("bucket");
    let rare_idx = argmax(&e.embed("rare").expect("embed")).expect("bucket");
    assert_ne!(shared_idx, rare_idx, "hash collision would invalidate the comparison");

    let mixed = e.embed("shared rare").expect("embed");
    assert!(mixed[rare_idx].abs() > mixed[shared_idx].abs());
    assert!((l2(&mixed) - 1.0).abs() < 1e-5);
    assert_eq!(mixed.len(), 256);
}

#[test]
fn tfidf_vocabulary_survives_restart() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let first = TfIdfEmbedder::new(128, Some(kv.clone()));
    first.fit(&["alpha beta".to_string(), "alpha gamma".to_string()]);
    let before = first.embed("alpha beta").expect("embed");

    // New instance over the same store picks up the fitted stats.
    let second = TfIdfEmbedder::new(128, Some(kv));
    let after = second.embed("alpha beta").expect("embed");
    for (x, y) in before.iter().zip(after.iter()) {
        assert!((x - y).abs() < 1e-6);
    }
}

#[test]
fn factory_selects_by_name() {
    let p = provider_from_name("hashing", 32, None).expect("provider");
    assert_eq!(p.dimension(), 32);
    assert!(p.id().starts_with("hashing"));
    assert!(provider_from_name("onnx-nonexistent", 32, None).is_err());
}
