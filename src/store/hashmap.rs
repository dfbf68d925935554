//! Concurrent hash map built from locking linked lists.
//!
//! ## Architecture
//! - A table of `capacity` buckets, each a [`LinkedList`] of `MapEntry`,
//!   behind one map-level `RwLock`.
//! - A key lives in bucket `hash(key) % capacity`; the hasher is fixed when
//!   the map is built (default `RandomState`, seeded once per map).
//! - Ordinary operations take the map lock shared and serialise per bucket
//!   through the bucket list's own lock, so operations on different buckets
//!   run in parallel.
//! - Growth takes the map lock exclusively and rehashes every entry into a
//!   larger table.
//!
//! ```text
//!   ConcurrentHashMap
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ shared: Arc<MapShared>                                     │
//!   │   table: RwLock<Vec<LinkedList<MapEntry<K, V>>>>           │
//!   │     [0] ─► (k7,v) ◄─► (k3,v)                               │
//!   │     [1] ─► ∅                                               │
//!   │     [2] ─► (k9,v)                                          │
//!   │   len: AtomicUsize     capacity: AtomicUsize               │
//!   │ resizer: Resizer       (single-flight, Weak<MapShared>)    │
//!   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Operations
//! - `put`: upsert into the key's bucket; may first request a resize.
//! - `get` / `get_with`: scan the key's bucket under read locks.
//! - `remove`: unlink the key's entry from its bucket.
//! - `clear`: empty every bucket under the exclusive map lock.
//!
//! ## Growth
//! When `len / capacity` exceeds the load factor (default
//! [`DEFAULT_LOAD_FACTOR`]), `put` requests a resize before touching its
//! bucket. The request never blocks in [`ResizeMode::Background`]: the
//! resize runs on a worker thread and the put proceeds on the current table.
//! The worker re-checks the load factor once it holds the write lock and
//! gives up if removals brought the map back under it. New capacities follow
//! [`grown_capacity`].
//!
//! ## Example Usage
//! ```rust
//! use lockweave::store::hashmap::ConcurrentHashMap;
//!
//! let map = ConcurrentHashMap::new(4);
//! for i in 0..25u32 {
//!     map.put(i, i * 10);
//! }
//! map.wait_for_resize();
//!
//! assert_eq!(map.len(), 25);
//! assert!(map.capacity() > 4);
//! assert_eq!(map.get(&7), Some(70));
//! assert_eq!(map.remove(&7), Some(70));
//! assert!(!map.contains_key(&7));
//! ```
//!
//! ## Type Constraints
//! - `K: Eq + Hash` for bucket lookup.
//! - `S: BuildHasher` for custom hashers (defaults to `RandomState`).
//! - `put` additionally needs `K, V, S: Send + Sync + 'static` because a
//!   resize may run on a worker thread.
//!
//! ## Thread Safety
//! - `ConcurrentHashMap` is `Send + Sync` when `K`, `V` and `S` are.
//! - Closures passed to `get_with` run under the bucket lock and must not
//!   call back into the map.
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::ds::linked_list::LinkedList;
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::{MapCounters, MapMetricsSnapshot};
use crate::store::resize::{DEFAULT_LOAD_FACTOR, ResizeMode, Resizer, grown_capacity};

/// A key/value pair stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapEntry<K, V> {
    key: K,
    value: V,
}

type Bucket<K, V> = LinkedList<MapEntry<K, V>>;

fn new_table<K, V>(capacity: usize) -> Vec<Bucket<K, V>> {
    (0..capacity).map(|_| LinkedList::new()).collect()
}

/// State shared between the map and its resize worker.
struct MapShared<K, V, S> {
    table: RwLock<Vec<Bucket<K, V>>>,
    len: AtomicUsize,
    // mirrors table.len() so put can test the load factor without locking
    capacity: AtomicUsize,
    load_factor: usize,
    hasher: S,
    #[cfg(feature = "metrics")]
    counters: MapCounters,
}

impl<K, V, S> MapShared<K, V, S> {
    fn over_threshold(&self, len: usize, capacity: usize) -> bool {
        len / capacity.max(1) > self.load_factor
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

impl<K, V, S> MapShared<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn bucket_index(&self, key: &K, capacity: usize) -> usize {
        (self.hasher.hash_one(key) % capacity.max(1) as u64) as usize
    }

    /// Rehashes every entry into a larger table, unless the load has dropped
    /// back under the threshold since the resize was requested.
    fn grow(&self) {
        let started = Instant::now();
        let mut table = self.table.write();
        let old_capacity = table.len();
        let len = self.len.load(Ordering::Acquire);
        if !self.over_threshold(len, old_capacity) {
            debug!(
                "resize abandoned: {len} entries in {old_capacity} buckets is within load factor {}",
                self.load_factor
            );
            #[cfg(feature = "metrics")]
            self.counters.inc_abandoned_resize();
            return;
        }

        let new_capacity = grown_capacity(old_capacity);
        let grown = new_table(new_capacity);
        for bucket in mem::take(&mut *table) {
            for entry in bucket.into_vec() {
                let index = self.bucket_index(&entry.key, new_capacity);
                grown[index].add_first(entry);
            }
        }
        *table = grown;
        self.capacity.store(new_capacity, Ordering::Release);
        #[cfg(feature = "metrics")]
        self.counters.inc_resize();

        info!(
            "resized map from {old_capacity} to {new_capacity} buckets ({len} entries) in {}us",
            started.elapsed().as_micros()
        );
    }
}

/// Thread-safe hash map whose buckets are [`LinkedList`]s.
pub struct ConcurrentHashMap<K, V, S = RandomState> {
    shared: Arc<MapShared<K, V, S>>,
    resizer: Resizer,
}

/// [`ConcurrentHashMap`] keyed through the Fx hasher.
pub type FxConcurrentHashMap<K, V> = ConcurrentHashMap<K, V, FxBuildHasher>;

impl<K, V> ConcurrentHashMap<K, V, RandomState> {
    /// Creates a map with `capacity` buckets. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> ConcurrentHashMap<K, V, S> {
    /// Creates a map with `capacity` buckets and a custom hasher.
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        Self::from_parts(capacity, DEFAULT_LOAD_FACTOR, ResizeMode::default(), hasher)
    }

    /// Assembles a map from already-validated parts.
    pub(crate) fn from_parts(
        capacity: usize,
        load_factor: usize,
        resize_mode: ResizeMode,
        hasher: S,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(MapShared {
                table: RwLock::new(new_table(capacity)),
                len: AtomicUsize::new(0),
                capacity: AtomicUsize::new(capacity),
                load_factor: load_factor.max(1),
                hasher,
                #[cfg(feature = "metrics")]
                counters: MapCounters::default(),
            }),
            resizer: Resizer::new(resize_mode),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current number of buckets.
    pub fn capacity(&self) -> usize {
        self.shared.capacity.load(Ordering::Acquire)
    }

    /// Returns the average chain length that triggers growth.
    pub fn load_factor(&self) -> usize {
        self.shared.load_factor
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resizer.mode()
    }

    /// Returns `true` while a resize is running.
    pub fn resize_in_flight(&self) -> bool {
        self.resizer.in_flight()
    }

    /// Blocks until a background resize, if any, has finished.
    pub fn wait_for_resize(&self) {
        self.resizer.wait();
    }

    /// Removes every entry. The bucket count is kept.
    pub fn clear(&self) {
        let table = self.shared.table.write();
        for bucket in table.iter() {
            bucket.clear();
        }
        self.shared.len.store(0, Ordering::Release);
    }

    /// Returns the chain length of every bucket, in bucket order.
    pub fn bucket_lengths(&self) -> Vec<usize> {
        self.shared.table.read().iter().map(LinkedList::len).collect()
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> MapMetricsSnapshot {
        self.shared.counters.snapshot(self.len(), self.capacity())
    }
}

impl<K, V, S> ConcurrentHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Runs `f` on the value stored for `key`.
    pub fn get_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let table = self.shared.table.read();
        let index = self.shared.bucket_index(key, table.len());
        let mut f = Some(f);
        let found = table[index].find_first_map(|entry| {
            if entry.key == *key {
                f.take().map(|f| f(&entry.value))
            } else {
                None
            }
        });
        self.shared.record_lookup(found.is_some());
        found
    }

    /// Returns a clone of the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        let table = self.shared.table.read();
        let index = self.shared.bucket_index(key, table.len());
        table[index].find_first_by(|entry| entry.key == *key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Option<V> {
        let table = self.shared.table.read();
        let index = self.shared.bucket_index(key, table.len());
        let removed = table[index].remove_first_by(|entry| entry.key == *key)?;
        self.shared.len.fetch_sub(1, Ordering::AcqRel);
        #[cfg(feature = "metrics")]
        self.shared.counters.inc_remove();
        Some(removed.value)
    }

    /// Returns `true` if any entry holds `value`. Scans every bucket.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        let table = self.shared.table.read();
        table
            .iter()
            .any(|bucket| bucket.find_first_by(|entry| entry.value == *value).is_some())
    }

    fn collect<R>(&self, mut project: impl FnMut(&MapEntry<K, V>) -> R) -> Vec<R> {
        let table = self.shared.table.read();
        let mut out = Vec::with_capacity(self.len());
        for bucket in table.iter() {
            bucket.for_each(|entry| out.push(project(entry)));
        }
        out
    }

    /// Snapshots every key, in no particular order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.collect(|entry| entry.key.clone())
    }

    /// Snapshots every value, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.collect(|entry| entry.value.clone())
    }

    /// Snapshots every `(key, value)` pair, in no particular order.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.collect(|entry| (entry.key.clone(), entry.value.clone()))
    }

    /// Checks that every entry sits in its home bucket exactly once and that
    /// the chain lengths add up to `len`.
    pub fn check_invariants(&self) -> Result<(), InvariantError>
    where
        K: Clone,
    {
        let table = self.shared.table.read();
        let capacity = table.len();
        if capacity != self.capacity() {
            return Err(InvariantError::new(format!(
                "table has {capacity} buckets but capacity reads {}",
                self.capacity()
            )));
        }

        let mut total = 0usize;
        for (index, bucket) in table.iter().enumerate() {
            bucket.check_invariants()?;
            let mut keys = Vec::with_capacity(bucket.len());
            bucket.for_each(|entry| keys.push(entry.key.clone()));

            let mut seen = FxHashSet::default();
            for key in &keys {
                let home = self.shared.bucket_index(key, capacity);
                if home != index {
                    return Err(InvariantError::new(format!(
                        "entry in bucket {index} hashes to bucket {home}"
                    )));
                }
                if !seen.insert(key) {
                    return Err(InvariantError::new(format!(
                        "duplicate key in bucket {index}"
                    )));
                }
            }
            total += keys.len();
        }

        let len = self.len();
        if total != len {
            return Err(InvariantError::new(format!(
                "buckets hold {total} entries but len is {len}"
            )));
        }
        Ok(())
    }
}

impl<K, V, S> ConcurrentHashMap<K, V, S>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Inserts or replaces the value for `key`, returning the replaced value.
    ///
    /// If the map is over its load factor a resize is requested first. In
    /// background mode the request does not block.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.maybe_grow();

        let shared = &self.shared;
        let table = shared.table.read();
        let index = shared.bucket_index(&key, table.len());
        let replaced = table[index].upsert_first_by(MapEntry { key, value }, |existing, new| {
            existing.key == new.key
        });

        match replaced {
            Some(old) => {
                #[cfg(feature = "metrics")]
                shared.counters.inc_update();
                Some(old.value)
            },
            None => {
                shared.len.fetch_add(1, Ordering::AcqRel);
                #[cfg(feature = "metrics")]
                shared.counters.inc_insert();
                None
            },
        }
    }

    /// Puts every pair from `entries`.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    fn maybe_grow(&self) {
        let shared = &self.shared;
        let len = shared.len.load(Ordering::Acquire);
        let capacity = shared.capacity.load(Ordering::Acquire);
        if shared.over_threshold(len, capacity) && !self.resizer.in_flight() {
            debug!("requesting resize: {len} entries in {capacity} buckets");
            self.resizer.request(&self.shared, MapShared::grow);
        }
    }
}

impl<K, V, S> Extend<(K, V)> for ConcurrentHashMap<K, V, S>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<K, V, S> fmt::Debug for ConcurrentHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentHashMap")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("load_factor", &self.load_factor())
            .field("resize_mode", &self.resize_mode())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn inline_map<K, V>(capacity: usize) -> ConcurrentHashMap<K, V> {
        ConcurrentHashMap::from_parts(
            capacity,
            DEFAULT_LOAD_FACTOR,
            ResizeMode::Inline,
            RandomState::new(),
        )
    }

    #[test]
    fn concurrent_hash_map_basic_ops() {
        let map = ConcurrentHashMap::new(8);
        assert_eq!(map.put("a", 1), None);
        assert_eq!(map.put("b", 2), None);
        assert_eq!(map.get(&"a"), Some(1));
        assert_eq!(map.len(), 2);

        assert_eq!(map.put("a", 10), Some(1));
        assert_eq!(map.get(&"a"), Some(10));
        assert_eq!(map.len(), 2);

        assert_eq!(map.remove(&"a"), Some(10));
        assert_eq!(map.remove(&"a"), None);
        assert_eq!(map.get(&"a"), None);
        assert!(map.contains_key(&"b"));
        assert!(!map.contains_key(&"a"));
        assert_eq!(map.len(), 1);
        map.check_invariants().unwrap();
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let map = ConcurrentHashMap::new(0);
        assert_eq!(map.capacity(), 1);
        map.put(1u8, 1u8);
        assert_eq!(map.get(&1), Some(1));
    }

    #[test]
    fn contains_value_scans_all_buckets() {
        let map = ConcurrentHashMap::new(4);
        map.put_all((0..20).map(|i| (i, i * 2)));
        assert!(map.contains_value(&38));
        assert!(!map.contains_value(&39));
    }

    #[test]
    fn keys_values_entries_snapshot() {
        let map = ConcurrentHashMap::new(4);
        map.put_all([("x", 1), ("y", 2), ("z", 3)]);

        let mut keys = map.keys();
        keys.sort_unstable();
        assert_eq!(keys, vec!["x", "y", "z"]);

        let mut values = map.values();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3]);

        let entries: HashMap<_, _> = map.entries().into_iter().collect();
        assert_eq!(entries.get("y"), Some(&2));
    }

    #[test]
    fn clear_keeps_capacity() {
        let map = inline_map(2);
        map.put_all((0..40).map(|i| (i, i)));
        let capacity = map.capacity();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.capacity(), capacity);
        assert_eq!(map.get(&3), None);
        assert!(map.bucket_lengths().iter().all(|len| *len == 0));
        map.check_invariants().unwrap();
    }

    #[test]
    fn get_with_projects_without_clone() {
        let map = ConcurrentHashMap::new(4);
        map.put(1, vec![1, 2, 3]);
        assert_eq!(map.get_with(&1, Vec::len), Some(3));
        assert_eq!(map.get_with(&2, Vec::len), None);
    }

    #[test]
    fn inline_growth_triggers_past_load_factor() {
        let map = inline_map(4);
        // 24 entries sit exactly at 24 / 4 == 6 > 5 when the 25th put arrives
        for i in 0..24 {
            map.put(i, i);
        }
        assert_eq!(map.capacity(), 4);
        map.put(24, 24);
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.len(), 25);
        for i in 0..25 {
            assert_eq!(map.get(&i), Some(i));
        }
        map.check_invariants().unwrap();
    }

    #[test]
    fn background_growth_settles_after_wait() {
        let map = ConcurrentHashMap::new(4);
        for i in 0..25u32 {
            map.put(i, i);
        }
        map.wait_for_resize();
        assert!(map.capacity() > 4);
        assert_eq!(map.len(), 25);
        assert!(!map.resize_in_flight());
        map.check_invariants().unwrap();
    }

    #[test]
    fn grow_abandons_when_under_threshold() {
        let map = inline_map::<u32, u32>(4);
        // no entries: a direct grow must be a no-op
        map.shared.grow();
        assert_eq!(map.capacity(), 4);
    }

    #[test]
    fn custom_hasher_and_fx_alias() {
        let map: FxConcurrentHashMap<u64, &str> =
            ConcurrentHashMap::with_hasher(16, FxBuildHasher);
        map.put(7, "seven");
        assert_eq!(map.get(&7), Some("seven"));
        map.check_invariants().unwrap();
    }

    #[test]
    fn extend_puts_pairs() {
        let mut map = ConcurrentHashMap::new(4);
        map.extend([(1, "a"), (2, "b")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&2), Some("b"));
    }

    #[test]
    fn debug_reports_shape() {
        let map: ConcurrentHashMap<u8, u8> = ConcurrentHashMap::new(3);
        let rendered = format!("{map:?}");
        assert!(rendered.contains("capacity: 3"));
        assert!(rendered.contains("len: 0"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_track_hits_misses_and_resizes() {
        let map = inline_map(1);
        for i in 0..7 {
            map.put(i, i);
        }
        map.put(0, 100);
        map.get(&0);
        map.get(&99);
        map.remove(&1);

        let snap = map.metrics_snapshot();
        assert_eq!(snap.inserts, 7);
        assert_eq!(snap.updates, 1);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.removes, 1);
        assert_eq!(snap.resizes, 1);
        assert_eq!(snap.len, 6);
    }

    mod property_tests {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8, u16),
            Remove(u8),
            Get(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Put(k, v)),
                1 => any::<u8>().prop_map(Op::Remove),
                1 => any::<u8>().prop_map(Op::Get),
            ]
        }

        proptest! {
            /// Property: the map agrees with std HashMap through growth
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_matches_std_hashmap(
                capacity in 1usize..6,
                ops in prop::collection::vec(op_strategy(), 0..300),
            ) {
                let map = inline_map(capacity);
                let mut model = HashMap::new();

                for op in ops {
                    match op {
                        Op::Put(k, v) => {
                            prop_assert_eq!(map.put(k, v), model.insert(k, v));
                        },
                        Op::Remove(k) => {
                            prop_assert_eq!(map.remove(&k), model.remove(&k));
                        },
                        Op::Get(k) => {
                            prop_assert_eq!(map.get(&k), model.get(&k).copied());
                        },
                    }
                }

                prop_assert_eq!(map.len(), model.len());
                prop_assert!(map.check_invariants().is_ok());
                let mut entries = map.entries();
                entries.sort_unstable();
                let mut expected: Vec<_> = model.into_iter().collect();
                expected.sort_unstable();
                prop_assert_eq!(entries, expected);
            }
        }
    }
}
