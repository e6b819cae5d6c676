//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Expiry sweeper: removes expired cache entries at a configured interval

mod sweeper;

pub use sweeper::{spawn_configured_sweeper, spawn_expiry_sweeper};
