//! Get-or-populate on top of the cache engine.

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::cache::Cache;
use crate::error::{CacheError, LoadError};

impl Cache {
    // == Get Or Set ==
    /// Returns the cached value for `key`, or runs `factory` and caches its result.
    ///
    /// A fresh hit never calls `factory`. `NotFound`, `Expired` and an
    /// `Invalidated` record run it, and its result replaces whatever was
    /// stored; any other engine error is returned without running it. A failing factory
    /// writes nothing and its error is returned as [`LoadError::Producer`].
    ///
    /// Concurrent misses on one key each run their own factory; the last
    /// write wins.
    pub async fn get_or_set_item<T, E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        group: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<T, LoadError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get_item::<T>(key).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_miss() => {}
            Err(err) => return Err(err.into()),
        }

        debug!(key, "running factory");
        self.counters().record_producer_run();
        let value = factory().await.map_err(LoadError::Producer)?;

        let serialized = serde_json::to_value(&value).map_err(CacheError::from)?;
        self.put_value(key, serialized, group, ttl).await?;
        Ok(value)
    }

    /// Synchronous-factory variant of [`Cache::get_or_set_item`].
    pub async fn get_or_compute_item<T, E, F>(
        &self,
        key: &str,
        factory: F,
        group: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<T, LoadError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        self.get_or_set_item(key, || std::future::ready(factory()), group, ttl)
            .await
    }
}
