/// Point-in-time view of the map counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MapMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub resizes: u64,
    pub abandoned_resizes: u64,

    // gauges captured at snapshot time
    pub len: usize,
    pub capacity: usize,
}

/// Point-in-time view of the LRU counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LruMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub evictions: u64,

    pub len: usize,
    pub capacity: usize,
}

impl LruMetricsSnapshot {
    /// Fraction of lookups that hit, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
