//! Cache Module
//!
//! TTL cache engine with group invalidation, get-or-populate and
//! stale-while-revalidate streams.

mod engine;
mod entry;
mod factory;
mod groups;
mod stats;
mod stream;


// Re-export public types
pub use engine::Cache;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use groups::GroupIndex;
pub use stats::CacheStats;
pub use stream::{DelayType, DelayedStream};

// == Public Constants ==
/// Reserved key holding the serialized group index
pub const GROUP_INDEX_KEY: &str = "__stale_cache_groups";
