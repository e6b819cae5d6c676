//! Store Module
//!
//! The async key-value interface the cache engine persists through, plus the
//! backends shipped with the crate.
//!
//! A store owns no policy: it maps string keys to opaque string payloads.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Store Trait ==
/// Async string-keyed storage backend.
///
/// `ready` must complete before any other method is called.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Completes once the backend has finished initialisation.
    async fn ready(&self) -> Result<(), StoreError>;

    /// Returns the payload stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous payload.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently held.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Drops every key.
    async fn clear(&self) -> Result<(), StoreError>;
}
