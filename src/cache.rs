//! Enumeration Cache
//!
//! Bounded, shared, segmented LRU mapping (store, key) to an assigned id.
//!
//! ## Segments
//! ```text
//!   put ──► probation (LRU) ──hit──► protected (LRU)
//!               │                         │
//!            evicted ◄────── demoted ─────┘
//! ```
//! New entries start in the probation segment; a hit promotes them to the
//! protected segment, whose overflow is demoted back to probation. Only the
//! probation segment ever drops entries, and dropping never touches storage.
//!
//! Keys are opaque byte strings: the owning store's id followed by the
//! encoded key, so equal keys in different stores never collide.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Segments {
    probation: LruCache<Box<[u8]>, u32>,
    protected: LruCache<Box<[u8]>, u32>,
}

/// Shared (store, key) → id cache
pub struct EnumerationCache {
    segments: Mutex<Segments>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl EnumerationCache {
    /// Create a cache holding up to `capacity` entries per segment
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            segments: Mutex::new(Segments {
                probation: LruCache::new(cap),
                protected: LruCache::new(cap),
            }),
            capacity: cap.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up an id, promoting the entry on a hit
    pub fn get(&self, key: &[u8]) -> Option<u32> {
        let mut segments = self.segments.lock();

        if let Some(&id) = segments.protected.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(id);
        }

        match segments.probation.pop(key) {
            Some(id) => {
                if let Some((demoted, demoted_id)) = segments.protected.push(Box::from(key), id) {
                    self.insert_probation(&mut segments, demoted, demoted_id);
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(id)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record the id assigned to `key`
    pub fn put(&self, key: &[u8], id: u32) {
        let mut segments = self.segments.lock();

        if let Some(slot) = segments.protected.peek_mut(key) {
            *slot = id;
            return;
        }
        self.insert_probation(&mut segments, Box::from(key), id);
    }

    fn insert_probation(&self, segments: &mut Segments, key: Box<[u8]>, id: u32) {
        if let Some((evicted, _)) = segments.probation.push(key, id) {
            // push also hands back the old pair when the key was already present
            if segments.probation.peek(&evicted).is_none() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &[u8]) -> usize {
        let mut guard = self.segments.lock();
        let segments = &mut *guard;
        let mut removed = 0;

        for segment in [&mut segments.probation, &mut segments.protected] {
            let stale: Vec<Box<[u8]>> = segment
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in stale {
                segment.pop(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "invalidated cache entries");
        }
        removed
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut segments = self.segments.lock();
        segments.probation.clear();
        segments.protected.clear();
    }

    /// Number of cached entries across both segments
    pub fn len(&self) -> usize {
        let segments = self.segments.lock();
        segments.probation.len() + segments.protected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-segment capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
