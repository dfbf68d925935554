pub use crate::builder::{LruBuilder, MapBuilder};
pub use crate::ds::{LinkedList, NodeRef};
pub use crate::error::{ConfigError, InvalidNodeError, InvariantError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{LruMetricsSnapshot, MapMetricsSnapshot};
pub use crate::policy::lru::LruCache;
pub use crate::store::hashmap::{ConcurrentHashMap, FxConcurrentHashMap};
pub use crate::store::resize::{DEFAULT_LOAD_FACTOR, ResizeMode};
