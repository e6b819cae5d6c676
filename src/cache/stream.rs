//! Stream Adapters
//!
//! Deliver cached values and producer results as streams.
//!
//! [`Cache::load_from_future`] turns a one-shot producer into a stream with a
//! single item. [`Cache::load_from_delayed_stream`] implements
//! stale-while-revalidate: with [`DelayType::All`] an expired entry is emitted
//! first and the producer's result follows as a second item.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::{CacheError, LoadError};

// == Delay Type ==
/// What to do with an expired entry in [`Cache::load_from_delayed_stream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelayType {
    /// Serve the stale value and stop
    #[default]
    None,
    /// Serve the stale value, then refresh and serve the producer's result
    All,
}

impl FromStr for DelayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DelayType::None),
            "all" => Ok(DelayType::All),
            other => Err(format!("unknown delay type: {other}")),
        }
    }
}

impl fmt::Display for DelayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayType::None => f.write_str("none"),
            DelayType::All => f.write_str("all"),
        }
    }
}

/// Stream returned by [`Cache::load_from_delayed_stream`].
pub type DelayedStream<T, E> = ReceiverStream<Result<T, LoadError<E>>>;

/// What the cache lookup decided before the producer is considered.
enum Lookup<T> {
    /// Emit this and finish
    Done(Result<T, CacheError>),
    /// Emit the stale value, then refresh when the delay type asks for it
    Stale(Result<T, CacheError>),
    Miss,
}

impl Cache {
    // == Load From Future ==
    /// Wraps a one-shot producer in get-or-populate semantics, as a stream.
    ///
    /// The stream yields exactly one item: the cached value on a fresh hit
    /// (the producer is dropped unpolled), otherwise the producer's result,
    /// which is cached on success. Nothing happens until the stream is polled.
    pub fn load_from_future<T, E, Fut>(
        &self,
        key: &str,
        producer: Fut,
        group: Option<&str>,
        ttl: Option<Duration>,
    ) -> impl Stream<Item = Result<T, LoadError<E>>>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache = self.clone();
        let key = key.to_string();
        let group = group.map(str::to_string);

        stream::once(async move {
            cache
                .get_or_set_item(&key, || producer, group.as_deref(), ttl)
                .await
        })
    }

    // == Load From Delayed Stream ==
    /// Stale-while-revalidate over a streaming producer.
    ///
    /// The producer's first item is its result.
    ///
    /// | cache state | delay | items |
    /// |---|---|---|
    /// | fresh | any | cached value |
    /// | missing | any | producer result (cached on success) |
    /// | expired | `None` | stale value |
    /// | expired | `All` | stale value, then producer result (cached on success) |
    ///
    /// The lookup starts on a spawned task as soon as this is called, so it
    /// must run inside a tokio runtime. Dropping the returned stream only
    /// detaches the consumer: a producer that was due to run still runs once
    /// and its value is still written to the cache.
    pub fn load_from_delayed_stream<T, E, P>(
        &self,
        key: &str,
        producer: P,
        group: Option<&str>,
        ttl: Option<Duration>,
        delay: DelayType,
    ) -> DelayedStream<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Send + 'static,
        P: Stream<Item = Result<T, E>> + Send + 'static,
    {
        // Room for both items so the task never waits on a slow or absent consumer
        let (tx, rx) = mpsc::channel(2);
        let cache = self.clone();
        let key = key.to_string();
        let group = group.map(str::to_string);

        tokio::spawn(async move {
            let refresh = match cache.lookup(&key).await {
                Lookup::Done(item) => {
                    let _ = tx.send(item.map_err(LoadError::from)).await;
                    false
                }
                Lookup::Stale(item) => {
                    let decoded = item.is_ok();
                    let _ = tx.send(item.map_err(LoadError::from)).await;
                    decoded && delay == DelayType::All
                }
                Lookup::Miss => true,
            };
            if !refresh {
                return;
            }

            cache.counters().record_producer_run();
            let mut producer = Box::pin(producer);
            let item = match producer.next().await {
                Some(Ok(value)) => {
                    let written = match serde_json::to_value(&value) {
                        Ok(serialized) => {
                            cache.put_value(&key, serialized, group.as_deref(), ttl).await
                        }
                        Err(err) => Err(err.into()),
                    };
                    match written {
                        Ok(()) => Ok(value),
                        Err(err) => {
                            warn!(key = %key, error = %err, "failed to cache producer result");
                            Err(err.into())
                        }
                    }
                }
                Some(Err(err)) => {
                    debug!(key = %key, "producer failed");
                    Err(LoadError::Producer(err))
                }
                None => {
                    debug!(key = %key, "producer ended without a value");
                    return;
                }
            };

            if tx.send(item).await.is_err() {
                debug!(key = %key, "consumer detached before refresh completed");
            }
        });

        ReceiverStream::new(rx)
    }

    /// Classifies the entry under `key` without producing anything.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        match self.get_raw_item(key).await {
            Ok(entry) if entry.is_expired() => {
                self.counters().record_expired();
                debug!(key, "serving stale cache entry");
                Lookup::Stale(entry.value_as())
            }
            Ok(entry) => {
                self.counters().record_hit();
                Lookup::Done(entry.value_as())
            }
            Err(err) if err.is_miss() => {
                self.counters().record_miss();
                Lookup::Miss
            }
            Err(err) => Lookup::Done(Err(err)),
        }
    }
}
