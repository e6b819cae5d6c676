//! Cache Entry Module
//!
//! Defines the stored form of a cache entry and its JSON codec.

use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// A single cache entry with its expiration and group metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Caller supplied key
    pub key: String,
    /// The cached payload
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    /// Group tag used for bulk invalidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    ///
    /// A zero `ttl` produces an entry that never expires. TTLs too large to
    /// represent saturate at the far end of the timestamp range.
    pub fn new(key: impl Into<String>, value: Value, group: Option<String>, ttl: Duration) -> Self {
        let expires = if ttl.is_zero() {
            None
        } else {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            Some(current_timestamp_ms().saturating_add(ttl_ms))
        };

        Self {
            key: key.into(),
            value,
            expires,
            group,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry is expired at `now` (Unix milliseconds).
    ///
    /// An entry is expired once `now` is strictly past its expiration.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Checks whether the entry is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// Returns `Some(0)` once the entry has expired.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires
            .map(|expires| (expires - current_timestamp_ms()).max(0) as u64)
    }

    // == Value Access ==
    /// Deserializes the payload into `T`.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.value)?)
    }

    // == Codec ==
    /// Encodes the entry into its stored string form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a stored record for `key`.
    ///
    /// A record that is not a cache entry is reported as `Invalidated`.
    pub fn decode(key: &str, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|_| CacheError::Invalidated {
            key: key.to_string(),
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
