use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::{LruMetricsSnapshot, MapMetricsSnapshot};

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Counters for [`ConcurrentHashMap`](crate::store::hashmap::ConcurrentHashMap).
#[derive(Debug, Default)]
pub struct MapCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    resizes: AtomicU64,
    abandoned_resizes: AtomicU64,
}

impl MapCounters {
    /// Snapshot the counters together with the current gauges.
    pub fn snapshot(&self, len: usize, capacity: usize) -> MapMetricsSnapshot {
        MapMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            resizes: self.resizes.load(Ordering::Relaxed),
            abandoned_resizes: self.abandoned_resizes.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }

    pub fn inc_hit(&self) {
        bump(&self.hits);
    }

    pub fn inc_miss(&self) {
        bump(&self.misses);
    }

    pub fn inc_insert(&self) {
        bump(&self.inserts);
    }

    pub fn inc_update(&self) {
        bump(&self.updates);
    }

    pub fn inc_remove(&self) {
        bump(&self.removes);
    }

    pub fn inc_resize(&self) {
        bump(&self.resizes);
    }

    pub fn inc_abandoned_resize(&self) {
        bump(&self.abandoned_resizes);
    }
}

/// Counters for [`LruCache`](crate::policy::lru::LruCache).
#[derive(Debug, Default)]
pub struct LruCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    evictions: AtomicU64,
}

impl LruCounters {
    /// Snapshot the counters together with the current gauges.
    pub fn snapshot(&self, len: usize, capacity: usize) -> LruMetricsSnapshot {
        LruMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }

    pub fn inc_hit(&self) {
        bump(&self.hits);
    }

    pub fn inc_miss(&self) {
        bump(&self.misses);
    }

    pub fn inc_insert(&self) {
        bump(&self.inserts);
    }

    pub fn inc_update(&self) {
        bump(&self.updates);
    }

    pub fn inc_eviction(&self) {
        bump(&self.evictions);
    }
}
