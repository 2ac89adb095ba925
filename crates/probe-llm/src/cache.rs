//! Bounded, TTL-evicting memo for goal-parse results

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Upper bound on entries, whatever the configuration asks for
pub const MAX_CAPACITY: usize = 100;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// LRU cache whose entries also expire after `ttl`
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.clamp(1, MAX_CAPACITY)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Fresh value for `key`; an expired entry is dropped on the way
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let expired = match guard.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.pop(key);
        }
        None
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
