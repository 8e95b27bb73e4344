//! Enumerator Context
//!
//! The state every enumerator of a deployment shares: the storage lock
//! serializing raw byte I/O, the enumeration cache, and the store-identity
//! allocator. Construct one per deployment (or per test) and hand it to each
//! enumerator at open time.
//!
//! ## Lock Order
//! storage lock → store monitor. The cache lock is only taken on its own,
//! for a single get/put, never while the other two are held.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::cache::EnumerationCache;
use crate::config::Config;

/// Identity of one open enumerator; never reused within a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    /// Bytes prefixed to every cache key owned by this store
    pub fn prefix(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Shared lock + cache context
pub struct EnumContext {
    storage_lock: Mutex<()>,
    cache: EnumerationCache,
    next_store_id: AtomicU64,
}

impl EnumContext {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            storage_lock: Mutex::new(()),
            cache: EnumerationCache::new(cache_capacity),
            next_store_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_capacity)
    }

    pub fn cache(&self) -> &EnumerationCache {
        &self.cache
    }

    /// Drop every cached id (test helper; stores keep working through storage)
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub(crate) fn lock_storage(&self) -> MutexGuard<'_, ()> {
        self.storage_lock.lock()
    }

    pub(crate) fn allocate_store_id(&self) -> StoreId {
        StoreId(self.next_store_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EnumContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
