//! Bounded sample caches.
//!
//! Dynamic (time-varying) values are cached per `(path, time)` in a
//! [`CappedCache`]. When full, roughly half of the entries are dropped to make
//! room; evicted values are simply recomputed on the next query.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::util::Chrono;

/// Key for time-sampled cache entries.
///
/// Times are compared by bit pattern (with `-0.0` folded into `0.0`), so two
/// queries share an entry only when they ask for exactly the same time.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct SampleKey {
    /// Full node path.
    pub path: Arc<str>,
    /// Bit pattern of the sample time.
    time_bits: u64,
}

impl SampleKey {
    /// Create a new cache key.
    pub fn new(path: Arc<str>, time: Chrono) -> Self {
        let time = if time == 0.0 { 0.0 } else { time };
        Self { path, time_bits: time.to_bits() }
    }

    /// Sample time this key was built for.
    #[inline]
    pub fn time(&self) -> Chrono {
        f64::from_bits(self.time_bits)
    }
}

/// Map with a fixed entry budget. Not synchronized.
#[derive(Debug)]
pub struct CappedMap<K, V> {
    map: HashMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> CappedMap<K, V> {
    /// Create a map holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Get an entry.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    /// Check if a key is present.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert unless the key is already present.
    ///
    /// Returns the resident value, which is the existing one when another
    /// writer got there first.
    pub fn insert(&mut self, key: K, value: V) -> &V {
        if !self.map.contains_key(&key) && self.map.len() >= self.capacity {
            self.evict_some();
        }
        self.map.entry(key).or_insert(value)
    }

    /// Evict approximately half of the map.
    fn evict_some(&mut self) {
        let evict_count = (self.map.len() / 2).max(1);
        let keys: Vec<K> = self.map.keys().take(evict_count).cloned().collect();
        for key in keys {
            self.map.remove(&key);
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Thread-safe capped cache.
///
/// Uses `parking_lot::RwLock` for faster, non-poisoning locks. Values are
/// cloned out, so keep them small or wrap them in `Arc`.
#[derive(Debug)]
pub struct CappedCache<K, V> {
    inner: RwLock<CappedMap<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> CappedCache<K, V> {
    /// Create a new cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CappedMap::new(capacity)),
        }
    }

    /// Get a cached value if it exists.
    #[inline]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Insert a value, keeping any value already cached for the key.
    ///
    /// Returns the value that ends up in the cache.
    pub fn insert(&self, key: K, value: V) -> V {
        self.inner.write().insert(key, value).clone()
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Get the number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the entry budget.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str, t: f64) -> SampleKey {
        SampleKey::new(Arc::from(path), t)
    }

    #[test]
    fn test_cache_insert_get() {
        let cache = CappedCache::new(16);
        cache.insert(key("/a", 1.0), 42);

        assert_eq!(cache.get(&key("/a", 1.0)), Some(42));
        assert_eq!(cache.get(&key("/a", 2.0)), None);
        assert_eq!(cache.get(&key("/b", 1.0)), None);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = CappedCache::new(16);
        assert_eq!(cache.insert(key("/a", 0.0), 1), 1);
        assert_eq!(cache.insert(key("/a", 0.0), 2), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_negative_zero_shares_entry() {
        let cache = CappedCache::new(4);
        cache.insert(key("/a", -0.0), 7);
        assert_eq!(cache.get(&key("/a", 0.0)), Some(7));
    }

    #[test]
    fn test_cache_eviction() {
        let cache = CappedCache::new(8);
        for i in 0..100 {
            cache.insert(key("/a", i as f64), i);
        }
        assert!(cache.len() <= 8);
        // Most recent insert is always resident.
        assert_eq!(cache.get(&key("/a", 99.0)), Some(99));
    }

    #[test]
    fn test_cache_clear() {
        let cache = CappedCache::new(4);
        cache.insert(key("/a", 0.0), 1);
        assert!(!cache.is_empty());

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get(&key("/a", 0.0)).is_none());
    }
}
