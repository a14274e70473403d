use kbsearch_core::kv::{FileKvStore, MemoryKvStore};
use kbsearch_core::traits::KvStore;
use kbsearch_vector::cache::{content_hash, CacheConfig, EmbeddingCache};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const MODEL: &str = "test:d4";

fn cache_of(max_size: usize) -> EmbeddingCache {
    EmbeddingCache::new(CacheConfig { max_size, ..CacheConfig::default() }, None)
}

#[test]
fn hash_is_deterministic_and_collision_shy() {
    assert_eq!(content_hash("abc"), content_hash("abc"));
    assert_ne!(content_hash("abc"), content_hash("abd"));
    assert_eq!(content_hash("abc").len(), 64);
}

#[test]
fn set_then_get_round_trips() {
    let cache = cache_of(10);
    let v = vec![0.1f32, -0.2, 0.3, 1.5];
    assert!(cache.set("hello", &v, MODEL));
    let got = cache.get("hello", MODEL).expect("hit");
    for (a, b) in v.iter().zip(got.iter()) {
        assert!((a - b).abs() <= 1e-5);
    }
}

#[test]
fn entries_are_scoped_by_model() {
    let cache = cache_of(10);
    cache.set("text", &[1.0, 0.0], "model-a");
    assert!(cache.get("text", "model-b").is_none());
    assert!(cache.get("text", "model-a").is_some());
}

#[test]
fn miss_and_hit_counters() {
    let cache = cache_of(10);
    assert!(cache.get("nothing", MODEL).is_none());
    cache.set("something", &[1.0], MODEL);
    cache.get("something", MODEL);
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.inserts, 1);
}

#[test]
fn size_never_exceeds_max_after_any_set_sequence() {
    let cache = cache_of(8);
    for i in 0..100 {
        cache.set(&format!("content-{i}"), &[i as f32], MODEL);
        assert!(cache.len() <= 8, "cache grew past max_size");
    }
    assert!(cache.stats().evictions > 0);
}

#[test]
fn eviction_removes_least_recently_used() {
    let cache = EmbeddingCache::new(
        CacheConfig { max_size: 3, evict_fraction: 0.1, ttl: None },
        None,
    );
    cache.set("a", &[1.0], MODEL);
    cache.set("b", &[2.0], MODEL);
    cache.set("c", &[3.0], MODEL);
    // Touch "a" so "b" becomes the oldest.
    cache.get("a", MODEL);
    cache.set("d", &[4.0], MODEL);
    assert!(cache.has("a", MODEL));
    assert!(!cache.has("b", MODEL));
    assert!(cache.has("c", MODEL));
    assert!(cache.has("d", MODEL));
}

#[test]
fn delete_and_clear() {
    let cache = cache_of(10);
    cache.set("x", &[1.0], MODEL);
    assert!(cache.delete("x", MODEL));
    assert!(!cache.delete("x", MODEL));

    cache.set("y", &[2.0], MODEL);
    cache.get("y", MODEL);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats(), Default::default());
}

#[test]
fn cleanup_removes_idle_entries() {
    let cache = EmbeddingCache::new(
        CacheConfig { max_size: 10, ttl: Some(Duration::from_millis(20)), evict_fraction: 0.1 },
        None,
    );
    cache.set("old", &[1.0], MODEL);
    std::thread::sleep(Duration::from_millis(40));
    cache.set("fresh", &[2.0], MODEL);
    assert_eq!(cache.cleanup(), 1);
    assert!(!cache.has("old", MODEL));
    assert!(cache.has("fresh", MODEL));
}

#[test]
fn expired_entry_reads_as_miss() {
    let cache = EmbeddingCache::new(
        CacheConfig { max_size: 10, ttl: Some(Duration::from_millis(10)), evict_fraction: 0.1 },
        None,
    );
    cache.set("short-lived", &[1.0], MODEL);
    std::thread::sleep(Duration::from_millis(30));
    assert!(cache.get("short-lived", MODEL).is_none());
}

#[test]
fn batch_ops_match_single_ops() {
    let cache = cache_of(10);
    let items = vec![
        ("one".to_string(), vec![1.0f32]),
        ("two".to_string(), vec![2.0f32]),
    ];
    assert!(cache.set_many(&items, MODEL));
    let got = cache.get_many(&["one".to_string(), "two".to_string(), "three".to_string()], MODEL);
    assert_eq!(got[0], Some(vec![1.0]));
    assert_eq!(got[1], Some(vec![2.0]));
    assert_eq!(got[2], None);
}

#[test]
fn persists_through_kv_store() {
    let tmp = TempDir::new().expect("tempdir");
    let v = vec![0.5f32, -0.25, 0.125];
    {
        let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(tmp.path()).expect("open"));
        let cache = EmbeddingCache::new(CacheConfig::default(), Some(kv));
        cache.set("durable", &v, MODEL);
    }
    let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(tmp.path()).expect("reopen"));
    let cache = EmbeddingCache::new(CacheConfig::default(), Some(kv));
    let got = cache.get("durable", MODEL).expect("reloaded from store");
    for (a, b) in v.iter().zip(got.iter()) {
        assert!((a - b).abs() <= 1e-5);
    }
    // Reload counted as a hit, not a miss.
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn corrupt_kv_record_degrades_to_miss() {
    let kv = Arc::new(MemoryKvStore::new());
    kv.set(&format!("emb:{MODEL}:{}", content_hash("junk")), &[0xFF, 0x01])
        .expect("seed corrupt bytes");
    let cache = EmbeddingCache::new(CacheConfig::default(), Some(kv));
    assert!(cache.get("junk", MODEL).is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn access_metadata_is_tracked() {
    let cache = cache_of(10);
    cache.set("meta", &[1.0, 2.0], MODEL);
    cache.get("meta", MODEL);
    cache.get("meta", MODEL);
    assert_eq!(cache.access_count("meta", MODEL), Some(2));
    assert_eq!(cache.dimension("meta", MODEL), Some(2));
    assert!(cache.age("meta", MODEL).is_some());
}
