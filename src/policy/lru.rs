//! # Least Recently Used (LRU) Cache
//!
//! A fixed-capacity cache composed from two concurrent structures: a
//! [`ConcurrentHashMap`] from key to list handle, and a [`LinkedList`] that
//! keeps entries in recency order (MRU at the head, LRU at the tail).
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                           LruCache<K, V>                             │
//!   │                                                                      │
//!   │   latch: RwLock<()>      capacity: usize                             │
//!   │                                                                      │
//!   │   ┌──────────────────────────────────────────────────────────────┐   │
//!   │   │  index: ConcurrentHashMap<K, NodeRef>                        │   │
//!   │   │  ┌─────────┬────────────────────────────────────────────┐    │   │
//!   │   │  │   Key   │  NodeRef                                   │    │   │
//!   │   │  ├─────────┼────────────────────────────────────────────┤    │   │
//!   │   │  │  "a"    │  ──────────────────────────────────────┐   │    │   │
//!   │   │  │  "b"    │  ────────────────────────────────┐     │   │    │   │
//!   │   │  │  "c"    │  ──────────────────────────┐     │     │   │    │   │
//!   │   │  └─────────┴────────────────────────────┼─────┼─────┼───┘    │   │
//!   │   └─────────────────────────────────────────┼─────┼─────┼────────┘   │
//!   │                                             ▼     ▼     ▼            │
//!   │   recency: LinkedList<CacheEntry<K, V>>                              │
//!   │     head ──► [c:3] ◄──► [b:2] ◄──► [a:1] ◄── tail                    │
//!   │              MRU                    LRU                              │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## LRU Operations Flow
//!
//! ```text
//!   put(d) on a full cache (capacity = 3)
//!     head ──► [c] ◄──► [b] ◄──► [a] ◄── tail
//!     1. remove [a] from the tail and its key from the index
//!     2. add [d] at the head and index it
//!     head ──► [d] ◄──► [c] ◄──► [b] ◄── tail
//!
//!   get(b)
//!     1. look up b's handle in the index
//!     2. move [b] to the head
//!     head ──► [b] ◄──► [d] ◄──► [c] ◄── tail
//! ```
//!
//! ## Methods
//!
//! | Method           | Latch     | Description                              |
//! |------------------|-----------|------------------------------------------|
//! | `new(capacity)`  | -         | Create cache; capacity 0 is rejected     |
//! | `put(k, v)`      | Exclusive | Insert or update, may evict the LRU      |
//! | `get(&k)`        | Exclusive | Clone value, move to MRU                 |
//! | `remove(&k)`     | Exclusive | Remove entry by key                      |
//! | `touch(&k)`      | Exclusive | Move to MRU without reading the value    |
//! | `pop_lru()`      | Exclusive | Remove and return the LRU entry          |
//! | `clear()`        | Exclusive | Remove all entries                       |
//! | `peek(&k)`       | Shared    | Clone value, recency unchanged           |
//! | `peek_lru()`     | Shared    | Clone the LRU entry                      |
//! | `contains(&k)`   | Shared    | Key lookup, recency unchanged            |
//! | `keys_mru()`     | Shared    | Keys from MRU to LRU                     |
//! | `len()`          | Shared    | Current number of entries                |
//! | `capacity()`     | -         | Maximum number of entries                |
//!
//! ## Concurrency Model
//!
//! Every operation that changes recency or membership holds the latch
//! exclusively for its whole duration, so the index and the list can never
//! be observed disagreeing. Read-only operations share the latch. Lock order
//! is latch, then the index map's locks, then the list's locks.
//!
//! Values are returned as clones; store `Arc<V>` to share them instead.
//!
//! ## Example Usage
//!
//! ```rust
//! use lockweave::policy::lru::LruCache;
//!
//! let cache = LruCache::new(2).unwrap();
//! cache.put("a", 1);
//! cache.put("b", 2);
//! assert_eq!(cache.get(&"a"), Some(1));
//! cache.put("c", 3);
//!
//! assert!(!cache.contains(&"b"));
//! assert_eq!(cache.keys_mru(), vec!["c", "a"]);
//! ```
use std::fmt;
use std::hash::Hash;
use std::mem;

use log::trace;
use parking_lot::RwLock;

use crate::ds::linked_list::{LinkedList, NodeRef};
use crate::error::{ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::{LruCounters, LruMetricsSnapshot};
use crate::store::hashmap::ConcurrentHashMap;
use crate::store::resize::DEFAULT_LOAD_FACTOR;

/// A cached key/value pair, as held by the recency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheEntry<K, V> {
    key: K,
    value: V,
}

/// Thread-safe fixed-capacity LRU cache.
pub struct LruCache<K, V> {
    latch: RwLock<()>,
    capacity: usize,
    index: ConcurrentHashMap<K, NodeRef>,
    recency: LinkedList<CacheEntry<K, V>>,
    #[cfg(feature = "metrics")]
    counters: LruCounters,
}

impl<K, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// The index starts with `capacity / DEFAULT_LOAD_FACTOR` buckets (at
    /// least one) and grows on demand.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_index_buckets(capacity, (capacity / DEFAULT_LOAD_FACTOR).max(1))
    }

    /// Creates a cache whose index starts with `index_buckets` buckets.
    pub fn with_index_buckets(capacity: usize, index_buckets: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("LRU capacity must be greater than zero"));
        }
        Ok(Self {
            latch: RwLock::new(()),
            capacity,
            index: ConcurrentHashMap::new(index_buckets),
            recency: LinkedList::with_capacity(capacity),
            #[cfg(feature = "metrics")]
            counters: LruCounters::default(),
        })
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        let _latch = self.latch.read();
        self.recency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let _latch = self.latch.write();
        self.recency.clear();
        self.index.clear();
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> LruMetricsSnapshot {
        self.counters.snapshot(self.len(), self.capacity)
    }

    #[cfg(feature = "metrics")]
    fn record_lookup(&self, hit: bool) {
        if hit {
            self.counters.inc_hit();
        } else {
            self.counters.inc_miss();
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn record_lookup(&self, _hit: bool) {}
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone,
{
    /// Returns a clone of the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let _latch = self.latch.write();
        let Some(node) = self.index.get(key) else {
            self.record_lookup(false);
            return None;
        };
        self.record_lookup(true);
        self.recency.to_first(node);
        self.recency.get_with(node, |entry| entry.value.clone())
    }

    /// Returns a clone of the value for `key` without changing recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        let _latch = self.latch.read();
        let node = self.index.get(key)?;
        self.recency.get_with(node, |entry| entry.value.clone())
    }

    /// Inserts or updates `key`, making it the most recently used entry.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry. Returns the value replaced by an update.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let _latch = self.latch.write();
        if let Some(node) = self.index.get(&key) {
            let replaced = self
                .recency
                .update_with(node, |entry| mem::replace(&mut entry.value, value));
            self.recency.to_first(node);
            #[cfg(feature = "metrics")]
            self.counters.inc_update();
            return replaced;
        }

        if self.recency.len() >= self.capacity && self.take_lru().is_some() {
            trace!(
                "evicted least recently used entry (capacity {})",
                self.capacity
            );
            #[cfg(feature = "metrics")]
            self.counters.inc_eviction();
        }
        let node = self.recency.add_first(CacheEntry {
            key: key.clone(),
            value,
        });
        self.index.put(key, node);
        #[cfg(feature = "metrics")]
        self.counters.inc_insert();
        None
    }

    /// Returns `true` if `key` is cached. Recency is unchanged.
    pub fn contains(&self, key: &K) -> bool {
        let _latch = self.latch.read();
        self.index.contains_key(key)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let _latch = self.latch.write();
        let node = self.index.remove(key)?;
        self.recency.unlink(node).map(|entry| entry.value)
    }

    /// Marks `key` most recently used. Returns `false` if it is not cached.
    pub fn touch(&self, key: &K) -> bool {
        let _latch = self.latch.write();
        self.index
            .get(key)
            .is_some_and(|node| self.recency.to_first(node))
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&self) -> Option<(K, V)> {
        let _latch = self.latch.write();
        self.take_lru()
    }

    /// Returns a clone of the least recently used entry.
    pub fn peek_lru(&self) -> Option<(K, V)> {
        let _latch = self.latch.read();
        self.recency
            .last_with(|entry| (entry.key.clone(), entry.value.clone()))
    }

    /// Snapshots the keys from most to least recently used.
    pub fn keys_mru(&self) -> Vec<K> {
        let _latch = self.latch.read();
        let mut keys = Vec::with_capacity(self.recency.len());
        self.recency.for_each(|entry| keys.push(entry.key.clone()));
        keys
    }

    /// Caller must hold the latch exclusively.
    fn take_lru(&self) -> Option<(K, V)> {
        let entry = self.recency.remove_last()?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    /// Checks that the index and the recency list describe the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let _latch = self.latch.read();
        self.recency.check_invariants()?;
        self.index.check_invariants()?;

        let len = self.recency.len();
        if len != self.index.len() {
            return Err(InvariantError::new(format!(
                "recency list holds {len} entries but index holds {}",
                self.index.len()
            )));
        }
        if len > self.capacity {
            return Err(InvariantError::new(format!(
                "{len} entries exceed capacity {}",
                self.capacity
            )));
        }

        let mut cursor = self.recency.first();
        while let Some(node) = cursor {
            let key = self
                .recency
                .get_with(node, |entry| entry.key.clone())
                .ok_or_else(|| InvariantError::new("recency list yielded a stale handle"))?;
            if self.index.get(&key) != Some(node) {
                return Err(InvariantError::new(
                    "index does not point at the list node holding its key",
                ));
            }
            cursor = self.recency.next(node);
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
