use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    last_used: u64,
}

/// In-memory cache bounded by entry count and a per-entry time-to-live.
///
/// Owned by a single loader. When full, the least recently used entry is evicted.
/// There is no internal locking: methods take `&mut self`.
pub struct BoundedCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    max_entries: usize,
    ttl: Duration,
    tick: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
            tick: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_used = self.tick;
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                self.entries.remove(key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub fn put(&mut self, key: K, value: V) {
        self.tick += 1;
        let now = Instant::now();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.entries.retain(|_, entry| entry.expires_at > now);
            if self.entries.len() >= self.max_entries
                && let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(k, _)| k.clone())
            {
                debug!("Cache EVICT for key: {:?}", oldest);
                self.entries.remove(&oldest);
            }
        }
        debug!("Cache PUT for key: {:?}", key);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                last_used: self.tick,
            },
        );
    }

    pub fn remove(&mut self, key: &K) {
        self.entries.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Cache CLEAR");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
