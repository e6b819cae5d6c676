//! Error types for the cache
//!
//! Provides unified error handling using thiserror. The `Display` text of the
//! engine errors is a stable message catalog callers may match on.

use thiserror::Error;

// == Message Catalog ==
/// Message for a key that has no entry.
pub const MSG_NOT_FOUND: &str = "This value doesn't exist anymore.";
/// Message for an entry past its expiration.
pub const MSG_EXPIRED: &str = "This value has expired.";
/// Message for a stored record that is no longer a valid entry.
pub const MSG_INVALIDATED: &str = "This value is not valid anymore.";
/// Message for any operation on a disabled cache.
pub const MSG_DISABLED: &str = "Cache is not enabled.";

// == Store Error Enum ==
/// Failure reported by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem or driver I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend contents could not be read or written
    #[error("store encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Operation issued before `ready()` completed
    #[error("store is not ready")]
    NotReady,

    /// Any other backend specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The engine has been disabled with `enable_cache(false)`
    #[error("Cache is not enabled.")]
    Disabled,

    /// No entry is stored under the key
    #[error("This value doesn't exist anymore.")]
    NotFound { key: String },

    /// An entry exists but its expiration has passed
    #[error("This value has expired.")]
    Expired { key: String },

    /// The stored record could not be decoded as a cache entry
    #[error("This value is not valid anymore.")]
    Invalidated { key: String },

    /// The key collides with the engine's own bookkeeping record
    #[error("key '{key}' is reserved by the cache")]
    ReservedKey { key: String },

    /// A key pattern could not be compiled
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The value could not be converted to or from its cached form
    #[error("value encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Returns true for the outcomes that mean "run the producer".
    ///
    /// An undecodable record counts as a miss so the producer can replace it.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound { .. } | CacheError::Expired { .. } | CacheError::Invalidated { .. }
        )
    }
}

// == Load Error Enum ==
/// Error returned by the get-or-populate and streaming operations.
///
/// Producer failures are carried unmodified so callers can inspect them.
#[derive(Error, Debug)]
pub enum LoadError<E> {
    /// The cache engine failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The caller supplied factory or producer failed
    #[error("producer failed: {0}")]
    Producer(E),
}

impl<E> LoadError<E> {
    /// Borrows the producer error, if that is what failed.
    pub fn producer(&self) -> Option<&E> {
        match self {
            LoadError::Producer(err) => Some(err),
            LoadError::Cache(_) => None,
        }
    }

    /// Takes the producer error, if that is what failed.
    pub fn into_producer(self) -> Option<E> {
        match self {
            LoadError::Producer(err) => Some(err),
            LoadError::Cache(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
