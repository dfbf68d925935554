//! Builders for the map and the LRU cache.
//!
//! Collects construction parameters, validates them once, and hands back a
//! ready structure or a [`ConfigError`].
//!
//! ## Example
//!
//! ```rust
//! use lockweave::builder::{LruBuilder, MapBuilder};
//! use lockweave::store::ResizeMode;
//!
//! let map = MapBuilder::new(16)
//!     .load_factor(3)
//!     .resize_mode(ResizeMode::Inline)
//!     .build::<u64, String>()
//!     .unwrap();
//! map.put(1, "one".to_string());
//! assert_eq!(map.load_factor(), 3);
//!
//! let cache = LruBuilder::new(100).index_buckets(8).build::<u64, String>().unwrap();
//! cache.put(1, "hello".to_string());
//! assert_eq!(cache.get(&1), Some("hello".to_string()));
//!
//! assert!(LruBuilder::new(0).build::<u64, u64>().is_err());
//! ```

use std::collections::hash_map::RandomState;

use crate::error::ConfigError;
use crate::policy::lru::LruCache;
use crate::store::hashmap::ConcurrentHashMap;
use crate::store::resize::{DEFAULT_LOAD_FACTOR, ResizeMode};

/// Builder for [`ConcurrentHashMap`].
#[derive(Debug, Clone)]
pub struct MapBuilder<S = RandomState> {
    capacity: usize,
    load_factor: usize,
    resize_mode: ResizeMode,
    hasher: S,
}

impl MapBuilder<RandomState> {
    /// Starts a builder for a map with `capacity` initial buckets.
    ///
    /// A capacity of 0 is raised to 1 when the map is built.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            load_factor: DEFAULT_LOAD_FACTOR,
            resize_mode: ResizeMode::default(),
            hasher: RandomState::new(),
        }
    }
}

impl<S> MapBuilder<S> {
    /// Sets the average chain length that triggers growth.
    pub fn load_factor(mut self, load_factor: usize) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Chooses where triggered resizes run.
    pub fn resize_mode(mut self, resize_mode: ResizeMode) -> Self {
        self.resize_mode = resize_mode;
        self
    }

    /// Replaces the hasher used to pick buckets.
    pub fn hasher<H>(self, hasher: H) -> MapBuilder<H> {
        MapBuilder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            resize_mode: self.resize_mode,
            hasher,
        }
    }

    /// Builds the map.
    ///
    /// Fails if the load factor is zero.
    pub fn build<K, V>(self) -> Result<ConcurrentHashMap<K, V, S>, ConfigError> {
        if self.load_factor == 0 {
            return Err(ConfigError::new("load factor must be greater than zero"));
        }
        Ok(ConcurrentHashMap::from_parts(
            self.capacity,
            self.load_factor,
            self.resize_mode,
            self.hasher,
        ))
    }
}

/// Builder for [`LruCache`].
#[derive(Debug, Clone, Copy)]
pub struct LruBuilder {
    capacity: usize,
    index_buckets: Option<usize>,
}

impl LruBuilder {
    /// Starts a builder for a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index_buckets: None,
        }
    }

    /// Sets the initial bucket count of the key index.
    ///
    /// Defaults to `capacity / DEFAULT_LOAD_FACTOR`, at least one.
    pub fn index_buckets(mut self, buckets: usize) -> Self {
        self.index_buckets = Some(buckets);
        self
    }

    /// Builds the cache. Fails if the capacity is zero.
    pub fn build<K, V>(self) -> Result<LruCache<K, V>, ConfigError> {
        match self.index_buckets {
            Some(buckets) => LruCache::with_index_buckets(self.capacity, buckets),
            None => LruCache::new(self.capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxBuildHasher;

    use super::*;

    #[test]
    fn map_builder_defaults() {
        let map = MapBuilder::new(8).build::<u32, u32>().unwrap();
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.load_factor(), DEFAULT_LOAD_FACTOR);
        assert_eq!(map.resize_mode(), ResizeMode::Background);
    }

    #[test]
    fn map_builder_rejects_zero_load_factor() {
        let err = MapBuilder::new(8).load_factor(0).build::<u32, u32>().unwrap_err();
        assert!(err.message().contains("load factor"));
    }

    #[test]
    fn map_builder_raises_zero_capacity() {
        let map = MapBuilder::new(0).build::<u32, u32>().unwrap();
        assert_eq!(map.capacity(), 1);
    }

    #[test]
    fn map_builder_custom_load_factor_controls_growth() {
        let map = MapBuilder::new(2)
            .load_factor(1)
            .resize_mode(ResizeMode::Inline)
            .build::<u32, u32>()
            .unwrap();
        // 4 / 2 == 2 > 1 on the fifth put
        for i in 0..5 {
            map.put(i, i);
        }
        assert_eq!(map.capacity(), 4);
        map.check_invariants().unwrap();
    }

    #[test]
    fn map_builder_with_custom_hasher() {
        let map = MapBuilder::new(4)
            .hasher(FxBuildHasher)
            .build::<&str, i32>()
            .unwrap();
        map.put("a", 1);
        assert_eq!(map.get(&"a"), Some(1));
    }

    #[test]
    fn lru_builder_builds_and_validates() {
        let cache = LruBuilder::new(3).build::<u8, u8>().unwrap();
        assert_eq!(cache.capacity(), 3);
        assert!(LruBuilder::new(0).index_buckets(4).build::<u8, u8>().is_err());
    }

    #[test]
    fn lru_builder_index_buckets() {
        let cache = LruBuilder::new(50).index_buckets(1).build::<u32, u32>().unwrap();
        for i in 0..50 {
            cache.put(i, i);
        }
        assert_eq!(cache.len(), 50);
        cache.check_invariants().unwrap();
    }
}
