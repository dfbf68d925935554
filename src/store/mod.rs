pub mod hashmap;
pub mod resize;

pub use hashmap::{ConcurrentHashMap, FxConcurrentHashMap};
pub use resize::{DEFAULT_LOAD_FACTOR, ResizeMode, grown_capacity};
