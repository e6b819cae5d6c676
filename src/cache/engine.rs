//! Cache Engine Module
//!
//! Entry CRUD, expiration checks, group invalidation and the enable gate, on
//! top of any [`Store`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheStats, GroupIndex, GROUP_INDEX_KEY};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::Store;

// == Cache ==
/// Handle to a cache engine.
///
/// Cloning is cheap; clones share the store, the enable flag, the default
/// TTL and the statistics. `ready()` must complete before any other
/// operation is issued.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: Arc<dyn Store>,
    enabled: AtomicBool,
    /// Default TTL in milliseconds, 0 = never expires
    default_ttl_ms: AtomicU64,
    namespace: String,
    /// Serialises read-modify-write cycles on the group index
    groups_lock: Mutex<()>,
    stats: StatsCounters,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("enabled", &self.is_enabled())
            .field("default_ttl", &self.default_ttl())
            .field("namespace", &self.inner.namespace)
            .finish_non_exhaustive()
    }
}

impl Cache {
    // == Constructors ==
    /// Creates an enabled cache with no default TTL over `store`.
    pub fn new(store: impl Store) -> Self {
        Self::with_store(Arc::new(store), &Config::default())
    }

    /// Creates a cache over `store` using the given configuration.
    pub fn from_config(store: impl Store, config: &Config) -> Self {
        Self::with_store(Arc::new(store), config)
    }

    /// Creates a cache over an already shared store.
    pub fn with_store(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                enabled: AtomicBool::new(config.enabled),
                default_ttl_ms: AtomicU64::new(saturating_millis(config.default_ttl)),
                namespace: config.namespace.clone(),
                groups_lock: Mutex::new(()),
                stats: StatsCounters::default(),
            }),
        }
    }

    // == Lifecycle ==
    /// Waits for the underlying store to finish initialisation.
    pub async fn ready(&self) -> Result<()> {
        self.inner.store.ready().await?;
        Ok(())
    }

    /// Turns the cache on or off. Disabling never discards stored entries.
    pub fn enable_cache(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "cache toggled");
    }

    /// Returns whether the cache is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Sets the TTL used when callers pass `None`. Zero means never expires.
    pub fn set_default_ttl(&self, ttl: Duration) {
        self.inner
            .default_ttl_ms
            .store(saturating_millis(ttl), Ordering::SeqCst);
    }

    /// Returns the TTL used when callers pass `None`.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.inner.default_ttl_ms.load(Ordering::SeqCst))
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.inner.stats
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// When `group` is given the key is registered under it; a key moved out
    /// of a previous group is dropped from that group's index.
    /// `ttl = None` applies the default TTL.
    pub async fn set_item<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        group: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.check_enabled()?;
        let value = serde_json::to_value(value)?;
        self.put_value(key, value, group, ttl).await
    }

    /// Writes an already serialized value. Checks the enable gate itself.
    pub(crate) async fn put_value(
        &self,
        key: &str,
        value: Value,
        group: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.check_enabled()?;
        check_key(key)?;
        let ttl = ttl.unwrap_or_else(|| self.default_ttl());
        let entry = CacheEntry::new(key, value, group.map(str::to_string), ttl);
        let encoded = entry.encode()?;

        let _guard = self.inner.groups_lock.lock().await;
        let previous_group = self.read_entry_lenient(key).await?.and_then(|e| e.group);

        self.inner
            .store
            .set(&self.storage_key(key), encoded)
            .await?;
        self.inner.stats.record_write();

        if previous_group.is_some() || group.is_some() {
            let mut index = self.load_groups().await?;
            let mut changed = false;
            if let Some(old) = previous_group.as_deref().filter(|old| Some(*old) != group) {
                changed |= index.remove_key(old, key);
            }
            if let Some(new) = group {
                changed |= index.add(new, key);
            }
            if changed {
                self.save_groups(&index).await?;
            }
        }

        debug!(key, group, expires = ?entry.expires, "cache entry written");
        Ok(())
    }

    // == Get ==
    /// Returns the value stored under `key`.
    ///
    /// Fails with `NotFound` when absent and `Expired` when past its
    /// expiration. Expired entries are left in place.
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.check_enabled()?;
        check_key(key)?;

        let Some(entry) = self.read_entry(key).await? else {
            self.inner.stats.record_miss();
            debug!(key, "cache miss");
            return Err(CacheError::NotFound {
                key: key.to_string(),
            });
        };

        if entry.is_expired() {
            self.inner.stats.record_expired();
            debug!(key, "cache entry expired");
            return Err(CacheError::Expired {
                key: key.to_string(),
            });
        }

        self.inner.stats.record_hit();
        debug!(key, "cache hit");
        entry.value_as()
    }

    /// Returns the full entry for `key` regardless of expiration.
    pub async fn get_raw_item(&self, key: &str) -> Result<CacheEntry> {
        self.check_enabled()?;
        check_key(key)?;
        self.read_entry(key).await?.ok_or_else(|| CacheError::NotFound {
            key: key.to_string(),
        })
    }

    /// Returns every entry held by this cache, sorted by key.
    ///
    /// Records that no longer decode as entries are skipped.
    pub async fn get_raw_items(&self) -> Result<Vec<CacheEntry>> {
        self.check_enabled()?;

        let mut entries = Vec::new();
        for key in self.own_keys().await? {
            match self.read_entry(&key).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(CacheError::Invalidated { key }) => {
                    warn!(key = %key, "skipping undecodable cache record");
                }
                Err(err) => return Err(err),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    // == Exists ==
    /// Returns whether an entry is stored under `key`, expired or not.
    pub async fn item_exists(&self, key: &str) -> Result<bool> {
        self.check_enabled()?;
        check_key(key)?;
        Ok(self
            .inner
            .store
            .get(&self.storage_key(key))
            .await?
            .is_some())
    }

    // == Remove ==
    /// Removes the entry under `key`. Removing an absent key is not an error.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        self.check_enabled()?;
        check_key(key)?;
        self.remove_keys(&[key.to_string()]).await?;
        Ok(())
    }

    /// Removes every key matching `pattern`, where `*` matches any run of
    /// characters and everything else matches literally. Returns the number
    /// of entries removed.
    pub async fn remove_items(&self, pattern: &str) -> Result<usize> {
        self.check_enabled()?;

        let matcher = key_pattern(pattern)?;
        let matching: Vec<String> = self
            .own_keys()
            .await?
            .into_iter()
            .filter(|key| matcher.is_match(key))
            .collect();
        let removed = self.remove_keys(&matching).await?;

        info!(pattern, removed, "removed matching cache entries");
        Ok(removed)
    }

    // == Clear Group ==
    /// Removes every entry registered under `group`, then the group itself.
    ///
    /// Members whose entry now carries a different group are left alone.
    pub async fn clear_group(&self, group: &str) -> Result<()> {
        self.check_enabled()?;

        let _guard = self.inner.groups_lock.lock().await;
        let mut index = self.load_groups().await?;
        let Some(members) = index.take_group(group) else {
            debug!(group, "clear of unknown group ignored");
            return Ok(());
        };

        let mut removed = 0usize;
        for key in &members {
            match self.read_entry_lenient(key).await? {
                Some(entry) if entry.group.as_deref() != Some(group) => continue,
                Some(_) => removed += 1,
                None => {}
            }
            self.inner.store.remove(&self.storage_key(key)).await?;
        }
        self.save_groups(&index).await?;

        info!(group, removed, "cache group cleared");
        Ok(())
    }

    // == Clear All ==
    /// Removes every entry of this cache and the group index.
    pub async fn clear_all(&self) -> Result<()> {
        self.check_enabled()?;

        let _guard = self.inner.groups_lock.lock().await;
        if self.inner.namespace.is_empty() {
            self.inner.store.clear().await?;
        } else {
            let prefix = format!("{}:", self.inner.namespace);
            for key in self.inner.store.keys().await? {
                if key.starts_with(&prefix) {
                    self.inner.store.remove(&key).await?;
                }
            }
        }

        info!(namespace = %self.inner.namespace, "cache cleared");
        Ok(())
    }

    // == Clear Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub async fn clear_expired(&self) -> Result<usize> {
        self.check_enabled()?;

        let expired: Vec<String> = self
            .get_raw_items()
            .await?
            .into_iter()
            .filter(CacheEntry::is_expired)
            .map(|entry| entry.key)
            .collect();
        let removed = self.remove_keys(&expired).await?;

        if removed > 0 {
            info!(removed, "expired cache entries cleared");
        }
        Ok(removed)
    }

    // == Internals ==
    fn check_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(CacheError::Disabled)
        }
    }

    fn storage_key(&self, key: &str) -> String {
        if self.inner.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.inner.namespace, key)
        }
    }

    /// Maps a store key back to a cache key, skipping foreign and reserved keys.
    fn cache_key(&self, stored: String) -> Option<String> {
        let key = if self.inner.namespace.is_empty() {
            stored
        } else {
            stored
                .strip_prefix(&self.inner.namespace)?
                .strip_prefix(':')?
                .to_string()
        };
        (key != GROUP_INDEX_KEY).then_some(key)
    }

    async fn own_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .store
            .keys()
            .await?
            .into_iter()
            .filter_map(|stored| self.cache_key(stored))
            .collect())
    }

    async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.inner.store.get(&self.storage_key(key)).await? {
            Some(raw) => CacheEntry::decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Like `read_entry` but treats an undecodable record as absent.
    async fn read_entry_lenient(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.read_entry(key).await {
            Err(CacheError::Invalidated { .. }) => Ok(None),
            other => other,
        }
    }

    /// Removes keys and their group memberships. Returns how many existed.
    async fn remove_keys(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let _guard = self.inner.groups_lock.lock().await;
        let mut index = self.load_groups().await?;
        let mut index_changed = false;
        let mut removed = 0usize;

        for key in keys {
            let storage_key = self.storage_key(key);
            let Some(raw) = self.inner.store.get(&storage_key).await? else {
                continue;
            };
            if let Ok(CacheEntry {
                group: Some(group), ..
            }) = CacheEntry::decode(key, &raw)
            {
                index_changed |= index.remove_key(&group, key);
            }
            self.inner.store.remove(&storage_key).await?;
            removed += 1;
        }

        if index_changed {
            self.save_groups(&index).await?;
        }
        Ok(removed)
    }

    async fn load_groups(&self) -> Result<GroupIndex> {
        let raw = self
            .inner
            .store
            .get(&self.storage_key(GROUP_INDEX_KEY))
            .await?;
        let Some(raw) = raw else {
            return Ok(GroupIndex::new());
        };
        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(err) => {
                warn!(error = %err, "group index unreadable, starting from empty");
                Ok(GroupIndex::new())
            }
        }
    }

    async fn save_groups(&self, index: &GroupIndex) -> Result<()> {
        let key = self.storage_key(GROUP_INDEX_KEY);
        if index.is_empty() {
            self.inner.store.remove(&key).await?;
        } else {
            self.inner
                .store
                .set(&key, serde_json::to_string(index)?)
                .await?;
        }
        Ok(())
    }
}

// == Helpers ==
fn check_key(key: &str) -> Result<()> {
    if key == GROUP_INDEX_KEY {
        Err(CacheError::ReservedKey {
            key: key.to_string(),
        })
    } else {
        Ok(())
    }
}

fn saturating_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Compiles a `*` wildcard pattern into an anchored regex.
fn key_pattern(pattern: &str) -> Result<Regex> {
    let body = regex::escape(pattern).replace(r"\*", ".*");
    Ok(Regex::new(&format!("^{body}$"))?)
}
