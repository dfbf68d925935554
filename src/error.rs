//! Error types for the lockweave library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when construction parameters are invalid
//!   (zero LRU capacity, zero load factor).
//! - [`InvalidNodeError`]: Returned when a list operation that inserts next to
//!   an existing node is handed a handle that no longer refers to a linked
//!   node of that list.
//! - [`InvariantError`]: Returned by `check_invariants` methods when an
//!   internal structural invariant does not hold.
//!
//! Absence (missing key, empty list) is never an error; those operations
//! return `Option` or `bool`.
//!
//! ## Example Usage
//!
//! ```
//! use lockweave::error::ConfigError;
//! use lockweave::policy::lru::LruCache;
//!
//! let cache: Result<LruCache<String, i32>, ConfigError> = LruCache::new(100);
//! assert!(cache.is_ok());
//!
//! let bad = LruCache::<String, i32>::new(0);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal invariants are violated.
///
/// Produced by `check_invariants` on the list, map and cache types. Carries a
/// human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when construction parameters are invalid.
///
/// # Example
///
/// ```
/// use lockweave::policy::lru::LruCache;
///
/// let err = LruCache::<u64, u64>::new(0).unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// InvalidNodeError
// ---------------------------------------------------------------------------

/// Error returned when a node handle does not refer to a linked node.
///
/// A handle goes stale once its node is unlinked, removed, or cleared, and a
/// handle issued by one list is never valid for another.
///
/// # Example
///
/// ```
/// use lockweave::ds::LinkedList;
///
/// let list = LinkedList::new();
/// let node = list.add_last(1);
/// list.unlink(node);
/// assert!(list.add_after(node, 2).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNodeError(String);

impl InvalidNodeError {
    /// Creates a new `InvalidNodeError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidNodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidNodeError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
