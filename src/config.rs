//! Configuration Module
//!
//! Handles loading cache settings from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Whether the cache starts enabled
    pub enabled: bool,
    /// TTL applied when callers omit one; zero means entries never expire
    pub default_ttl: Duration,
    /// Prefix isolating this cache's keys inside a shared store
    pub namespace: String,
    /// Interval of the expiry sweeper; zero disables it
    pub sweep_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENABLED` - Start enabled (default: true)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, fractions allowed (default: 0)
    /// - `CACHE_NAMESPACE` - Key namespace (default: empty)
    /// - `CACHE_SWEEP_INTERVAL` - Sweeper interval in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            enabled: env::var("CACHE_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| parse_seconds(&v))
                .unwrap_or(defaults.default_ttl),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| parse_seconds(&v))
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::ZERO,
            namespace: String::new(),
            sweep_interval: Duration::ZERO,
        }
    }
}

/// Parses a non-negative, possibly fractional, number of seconds.
pub fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
