//! lockweave: concurrent collections built on per-node locking.
//!
//! - [`ds::LinkedList`]: doubly linked list with a list lock and a lock per
//!   node, addressed through weak [`ds::NodeRef`] handles.
//! - [`store::ConcurrentHashMap`]: hash map whose buckets are linked lists,
//!   grown by a single-flight background resize.
//! - [`policy::LruCache`]: fixed-capacity LRU cache composed from one map and
//!   one list.
//!
//! Lock order, outermost first: LRU latch, map lock, bucket list lock, node
//! lock, neighbour node locks.
//!
//! The crate logs through the `log` facade and installs no logger.

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;
