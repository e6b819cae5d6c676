//! Stale Cache - A TTL cache with group invalidation
//!
//! Provides keyed caching over any async key-value store, get-or-populate
//! around factories and a stale-while-revalidate stream mode.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{Cache, CacheEntry, CacheStats, DelayType};
pub use config::Config;
pub use error::{CacheError, LoadError, StoreError};
pub use store::{FileStore, MemoryStore, Store};
pub use tasks::{spawn_configured_sweeper, spawn_expiry_sweeper};
