//! Operation counters for the map and the LRU cache.
//!
//! Compiled only with the `metrics` feature. Counters are relaxed atomics
//! bumped on the hot path; [`snapshot`] holds the plain `Copy` views returned
//! by `metrics_snapshot()`.

pub mod counters;
pub mod snapshot;

pub use counters::{LruCounters, MapCounters};
pub use snapshot::{LruMetricsSnapshot, MapMetricsSnapshot};
