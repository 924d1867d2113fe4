//! Size-aware, cost-weighted LRU blob cache.
//!
//! Built on [`lru::LruCache`] for O(1) recency bookkeeping rather than a
//! hand-rolled intrusive linked list: `lru::LruCache::iter().rev()` gives the
//! tail-side (least-recent) entries in order, and `lru::LruCache::pop` evicts
//! an arbitrary key regardless of its position, which is exactly what
//! cost-weighted eviction needs (it doesn't always evict the strict LRU
//! tail). See DESIGN.md for the grounding.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::blob::CachedBlob;
use crate::hash::Hash;

/// Tail-side sample size for cost-weighted eviction.
const EVICTION_SAMPLE_SIZE: usize = 5;

struct Entry {
    blob: Arc<CachedBlob>,
    size: u64,
    access_count: u64,
}

struct Inner {
    map: LruCache<Hash, Entry>,
    current_size: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
    pub current_size: u64,
    pub max_size: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`; `0.0` when there have been no lookups at all.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A concurrent, byte-bounded LRU cache of [`CachedBlob`] values keyed by
/// [`Hash`], with cost-weighted eviction.
pub struct LruBlobCache {
    inner: Mutex<Inner>,
    max_size: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Constructs a new cache bounded to `max_bytes` of blob data.
pub fn new_lru_blob_cache(max_bytes: u64) -> LruBlobCache {
    LruBlobCache::new(max_bytes)
}

impl LruBlobCache {
    pub fn new(max_bytes: u64) -> Self {
        // The backing LruCache is capped by entry count, not bytes; we drive
        // all eviction ourselves by `current_size`, so give it effectively
        // unlimited slots.
        let unlimited = NonZeroUsize::new(usize::MAX).expect("usize::MAX is non-zero");
        LruBlobCache {
            inner: Mutex::new(Inner { map: LruCache::new(unlimited), current_size: 0 }),
            max_size: max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up `hash`. On hit, bumps the entry's access count and promotes
    /// it to most-recently-used; on miss, returns `None`. Hit/miss counters
    /// are relaxed atomics, observable without taking the exclusive lock.
    pub fn get(&self, hash: &Hash) -> Option<Arc<CachedBlob>> {
        let mut inner = self.inner.lock();
        match inner.map.get_mut(hash) {
            Some(entry) => {
                entry.access_count += 1;
                let blob = Arc::clone(&entry.blob);
                drop(inner);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(blob)
            }
            None => {
                drop(inner);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Batched `get`, preserving per-entry hit/miss semantics and input order.
    pub fn get_multi(&self, hashes: &[Hash]) -> Vec<Option<Arc<CachedBlob>>> {
        hashes.iter().map(|h| self.get(h)).collect()
    }

    /// Inserts `blob` under `hash`. No-op if `blob`'s size exceeds the
    /// cache's maximum (such an entry could never be admitted). On an
    /// existing key, just bumps the access count and recency instead of
    /// reinserting. Otherwise evicts by cost until there's room, then
    /// inserts a detached clone at the head so upstream buffer reuse (e.g.
    /// an arena the caller frees after this call returns) can't invalidate
    /// cached bytes.
    pub fn put(&self, hash: Hash, blob: CachedBlob) {
        let size = blob.size();
        if size > self.max_size {
            return;
        }

        let mut inner = self.inner.lock();

        if let Some(entry) = inner.map.get_mut(&hash) {
            entry.access_count += 1;
            return;
        }

        Self::evict_until_fits(&mut inner, size, self.max_size);

        let detached = Arc::new(blob.detached_clone());
        inner.current_size += size;
        inner.map.put(hash, Entry { blob: detached, size, access_count: 1 });
    }

    /// Batched `put`, preserving the same per-entry semantics as `put`.
    pub fn put_multi(&self, items: impl IntoIterator<Item = (Hash, CachedBlob)>) {
        for (hash, blob) in items {
            self.put(hash, blob);
        }
    }

    /// Cost-weighted eviction: sample up to [`EVICTION_SAMPLE_SIZE`] entries
    /// from the tail side, evict the one with minimum
    /// `access_count / max(size_in_KiB, 1)`, and repeat until `incoming`
    /// would fit.
    fn evict_until_fits(inner: &mut Inner, incoming: u64, max_size: u64) {
        while inner.current_size + incoming > max_size && !inner.map.is_empty() {
            let candidate = inner
                .map
                .iter()
                .rev()
                .take(EVICTION_SAMPLE_SIZE)
                .map(|(hash, entry)| {
                    let size_kib = (entry.size / 1024).max(1);
                    let cost = entry.access_count as f64 / size_kib as f64;
                    (*hash, cost)
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).expect("cost is never NaN"))
                .map(|(hash, _)| hash);

            let Some(victim) = candidate else { break };
            if let Some(evicted) = inner.map.pop(&victim) {
                inner.current_size -= evicted.size;
            }
        }
    }

    /// A snapshot of the cache's counters and size.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: inner.map.len(),
            current_size: inner.current_size,
            max_size: self.max_size,
        }
    }

    /// Drops all entries. Hit/miss counters are left untouched.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.current_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_of_size(hash: Hash, size: usize) -> CachedBlob {
        CachedBlob::new(hash, vec![b'x'; size])
    }

    fn hash_byte(b: u8) -> Hash {
        let mut bytes = [0u8; 20];
        bytes[19] = b;
        Hash::from_bytes(bytes)
    }

    #[test]
    fn miss_then_hit() {
        let cache = new_lru_blob_cache(1_000_000);
        let h = hash_byte(1);
        assert!(cache.get(&h).is_none());
        cache.put(h, blob_of_size(h, 10));
        assert!(cache.get(&h).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn oversized_blob_never_admitted() {
        let cache = new_lru_blob_cache(100);
        let h = hash_byte(1);
        cache.put(h, blob_of_size(h, 200));
        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.stats().current_size, 0);
    }

    #[test]
    fn duplicate_put_bumps_access_without_growing_size() {
        let cache = new_lru_blob_cache(1_000_000);
        let h = hash_byte(1);
        cache.put(h, blob_of_size(h, 10));
        cache.put(h, blob_of_size(h, 10));
        assert_eq!(cache.stats().entry_count, 1);
        assert_eq!(cache.stats().current_size, 10);
    }

    #[test]
    fn eviction_keeps_size_under_max_and_preserves_hot_entry() {
        // max=1200, three 400-byte blobs all fit; the first is accessed
        // twice, making it hot before a fourth 400-byte blob forces an
        // eviction among the (now cold) other two.
        let cache = new_lru_blob_cache(1200);
        let a = hash_byte(1);
        let b = hash_byte(2);
        let c = hash_byte(3);
        let d = hash_byte(4);

        cache.put(a, blob_of_size(a, 400));
        cache.put(b, blob_of_size(b, 400));
        cache.put(c, blob_of_size(c, 400));
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&a).is_some());

        cache.put(d, blob_of_size(d, 400));

        let stats = cache.stats();
        assert!(stats.current_size <= 1200);
        assert!(cache.get(&a).is_some(), "hot entry should survive eviction");
    }

    #[test]
    fn clear_drops_everything_but_keeps_counters() {
        let cache = new_lru_blob_cache(1_000_000);
        let h = hash_byte(1);
        cache.put(h, blob_of_size(h, 10));
        let _ = cache.get(&h);
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn detached_clone_survives_source_mutation() {
        // Putting a blob backed by a buffer that is later
        // mutated must not change the cached bytes.
        let h = hash_byte(1);
        let mut source = vec![b'a'; 64];
        let cache = new_lru_blob_cache(1_000_000);
        cache.put(h, CachedBlob::new(h, source.clone()));
        source[0] = b'z';
        let cached = cache.get(&h).unwrap();
        assert_eq!(cached.data()[0], b'a');
    }

    #[test]
    fn get_multi_put_multi_preserve_order() {
        let cache = new_lru_blob_cache(1_000_000);
        let hashes = vec![hash_byte(1), hash_byte(2), hash_byte(3)];
        cache.put_multi(hashes.iter().map(|h| (*h, blob_of_size(*h, 10))));
        let results = cache.get_multi(&hashes);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Option::is_some));
    }

    #[test]
    fn concurrent_get_put_holds_size_invariant() {
        // Many threads hammering get/put on one cache must not panic, and
        // the byte-bound invariant must still hold once every thread has
        // finished.
        let cache = Arc::new(new_lru_blob_cache(50_000));
        let mut handles = Vec::new();
        for t in 0..8u8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..200u32 {
                    let h = hash_byte(((t as u32 * 200 + i) % 256) as u8);
                    cache.put(h, blob_of_size(h, 128));
                    let _ = cache.get(&h);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = cache.stats();
        assert!(stats.current_size <= stats.max_size);
        assert!(stats.hits + stats.misses > 0);
    }
}
