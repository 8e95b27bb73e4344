//! Tests for the enumeration cache and the shared context
//!
//! These tests verify:
//! - Segmented LRU behaviour (probation, protected, eviction)
//! - Hit/miss/eviction counters
//! - Prefix invalidation
//! - Enumerator correctness once entries are evicted
//! - Config from the environment

use std::path::PathBuf;
use std::sync::Arc;

use enumstore::cache::{CacheStats, EnumerationCache};
use enumstore::config::CACHE_SIZE_ENV;
use enumstore::{Config, EnumContext, PersistentEnumerator, StoreError, StringDescriptor};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cached.db");
    (temp_dir, path)
}

fn k(n: u32) -> Vec<u8> {
    format!("key-{}", n).into_bytes()
}

// =============================================================================
// EnumerationCache
// =============================================================================

#[test]
fn test_get_after_put() {
    let cache = EnumerationCache::new(8);

    cache.put(&k(1), 1);
    cache.put(&k(2), 2);

    assert_eq!(cache.get(&k(1)), Some(1));
    assert_eq!(cache.get(&k(2)), Some(2));
    assert_eq!(cache.get(&k(3)), None);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_probation_evicts_least_recent() {
    let cache = EnumerationCache::new(3);
    for n in 1..=4 {
        cache.put(&k(n), n);
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(&k(1)), None);
    assert_eq!(cache.get(&k(4)), Some(4));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_protected_entries_survive_a_scan() {
    let cache = EnumerationCache::new(2);
    cache.put(&k(1), 1);
    assert_eq!(cache.get(&k(1)), Some(1)); // promoted

    // A one-pass scan only churns the probation segment
    for n in 10..20 {
        cache.put(&k(n), n);
    }

    assert_eq!(cache.get(&k(1)), Some(1));
}

#[test]
fn test_hit_promotes_out_of_probation() {
    let cache = EnumerationCache::new(2);
    cache.put(&k(1), 1);
    cache.put(&k(2), 2);

    // Promote k1, then overflow probation
    assert_eq!(cache.get(&k(1)), Some(1));
    cache.put(&k(3), 3);
    cache.put(&k(4), 4);

    assert_eq!(cache.get(&k(1)), Some(1));
    assert_eq!(cache.get(&k(2)), None);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_protected_overflow_is_demoted_not_dropped() {
    let cache = EnumerationCache::new(1);
    cache.put(&k(1), 1);
    assert_eq!(cache.get(&k(1)), Some(1));
    cache.put(&k(2), 2);
    assert_eq!(cache.get(&k(2)), Some(2)); // k1 demoted to probation

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&k(1)), Some(1));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_reput_does_not_count_as_eviction() {
    let cache = EnumerationCache::new(2);
    cache.put(&k(1), 1);
    cache.put(&k(1), 1);
    cache.put(&k(2), 2);

    assert_eq!(cache.stats().evictions, 0);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_stats_count_hits_and_misses() {
    let cache = EnumerationCache::new(4);
    cache.put(&k(1), 1);

    cache.get(&k(1));
    cache.get(&k(1));
    cache.get(&k(2));

    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 2,
            misses: 1,
            evictions: 0
        }
    );
}

#[test]
fn test_invalidate_prefix_removes_only_matches() {
    let cache = EnumerationCache::new(8);
    cache.put(b"aa-1", 1);
    cache.put(b"aa-2", 2);
    cache.put(b"bb-1", 1);
    cache.get(b"aa-1"); // one entry in each segment

    let removed = cache.invalidate_prefix(b"aa");

    assert_eq!(removed, 2);
    assert_eq!(cache.get(b"aa-1"), None);
    assert_eq!(cache.get(b"bb-1"), Some(1));
}

#[test]
fn test_clear_and_capacity() {
    let cache = EnumerationCache::new(5);
    cache.put(&k(1), 1);

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.capacity(), 5);
    assert_eq!(EnumerationCache::new(0).capacity(), 1);
}

// =============================================================================
// Cache + Enumerator
// =============================================================================

#[test]
fn test_evicted_entries_resolve_through_storage() {
    let (_temp, path) = setup_temp_dir();
    let config = Config::builder().cache_capacity(4).initial_buckets(16).build();
    let context = Arc::new(EnumContext::from_config(&config));
    let store = PersistentEnumerator::open(&path, StringDescriptor::new(), &config, Arc::clone(&context)).unwrap();

    for i in 1..=5u32 {
        assert_eq!(store.enumerate(&format!("k{}", i)).unwrap(), i);
    }
    let before = context.cache().stats();
    assert_eq!(before.evictions, 1);
    assert_eq!(before.misses, 5);

    // k1 fell out of the cache; the directory still knows it
    assert_eq!(store.try_enumerate(&"k1".to_string()).unwrap(), 1);
    assert_eq!(context.cache().stats().misses, 6);
    assert_eq!(store.record_count().unwrap(), 5);

    store.close().unwrap();
}

#[test]
fn test_repeat_lookups_hit_the_cache() {
    let (_temp, path) = setup_temp_dir();
    let config = Config::builder().initial_buckets(16).build();
    let context = Arc::new(EnumContext::from_config(&config));
    let store = PersistentEnumerator::open(&path, StringDescriptor::new(), &config, Arc::clone(&context)).unwrap();

    store.enumerate(&"hot".to_string()).unwrap();
    for _ in 0..10 {
        assert_eq!(store.enumerate(&"hot".to_string()).unwrap(), 1);
    }

    assert_eq!(context.cache().stats().hits, 10);
    store.close().unwrap();
}

#[test]
fn test_context_store_ids_are_unique() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().initial_buckets(16).build();
    let context = Arc::new(EnumContext::from_config(&config));

    let ids: Vec<u64> = (0..3)
        .map(|n| {
            let store = PersistentEnumerator::open(
                temp_dir.path().join(format!("s{}.db", n)),
                StringDescriptor::new(),
                &config,
                Arc::clone(&context),
            )
            .unwrap();
            let id = store.store_id().get();
            store.close().unwrap();
            id
        })
        .collect();

    assert_eq!(ids, vec![1, 2, 3]);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_cache_size_from_env() {
    // The only test touching this variable
    std::env::set_var(CACHE_SIZE_ENV, "16");
    let config = Config::from_env().unwrap();
    assert_eq!(config.cache_capacity, 16);
    assert_eq!(EnumContext::from_config(&config).cache().capacity(), 16);

    std::env::set_var(CACHE_SIZE_ENV, "lots");
    assert!(matches!(Config::from_env(), Err(StoreError::Config(_))));

    std::env::set_var(CACHE_SIZE_ENV, "0");
    assert!(matches!(Config::from_env(), Err(StoreError::Config(_))));

    std::env::remove_var(CACHE_SIZE_ENV);
    assert_eq!(Config::from_env().unwrap().cache_capacity, Config::default().cache_capacity);
}

#[test]
fn test_config_validation() {
    assert!(Config::default().validate().is_ok());
    assert!(Config::builder().initial_buckets(8).build().validate().is_err());
    assert!(Config::builder().initial_buckets(48).build().validate().is_err());
    assert!(Config::builder().max_chain_length(0).build().validate().is_err());
    assert!(Config::builder().cache_capacity(0).build().validate().is_err());
    assert!(Config::builder().page_size(0).build().validate().is_err());
}
