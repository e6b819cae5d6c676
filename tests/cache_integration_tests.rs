//! Integration Tests for the public cache API
//!
//! Exercises the engine, the factory coordinator and both stream adapters
//! through the crate's public surface, over both shipped stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stale_cache::error::{MSG_DISABLED, MSG_EXPIRED, MSG_NOT_FOUND};
use stale_cache::{Cache, CacheError, Config, DelayType, FileStore, LoadError, MemoryStore};

// == Helper Functions ==

async fn create_test_cache() -> Cache {
    let cache = Cache::new(MemoryStore::new());
    cache.ready().await.unwrap();
    cache
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u32,
    name: String,
}

// == Engine Scenarios ==

#[tokio::test]
async fn test_fractional_ttl_scenario() {
    let cache = create_test_cache().await;

    cache
        .set_item("a", "x", None, Some(Duration::from_secs_f64(0.4)))
        .await
        .unwrap();
    assert_eq!(cache.get_item::<String>("a").await.unwrap(), "x");

    tokio::time::sleep(Duration::from_millis(401)).await;

    let err = cache.get_item::<String>("a").await.unwrap_err();
    assert!(matches!(err, CacheError::Expired { .. }));
    assert_eq!(err.to_string(), MSG_EXPIRED);
    assert!(cache.item_exists("a").await.unwrap());
}

#[tokio::test]
async fn test_no_ttl_never_expires() {
    let cache = create_test_cache().await;

    cache.set_item("forever", &42u64, None, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.get_item::<u64>("forever").await.unwrap(), 42);
    assert!(cache.get_raw_item("forever").await.unwrap().expires.is_none());
}

#[tokio::test]
async fn test_typed_values_roundtrip() {
    let cache = create_test_cache().await;
    let profile = Profile {
        id: 7,
        name: "Ada".to_string(),
    };

    cache.set_item("profile:7", &profile, Some("profiles"), None).await.unwrap();

    assert_eq!(cache.get_item::<Profile>("profile:7").await.unwrap(), profile);
}

#[tokio::test]
async fn test_disable_and_enable_messages() {
    let cache = create_test_cache().await;
    cache.set_item("k", "v", None, None).await.unwrap();

    cache.enable_cache(false);
    let err = cache.item_exists("k").await.unwrap_err();
    assert_eq!(err.to_string(), MSG_DISABLED);

    cache.enable_cache(true);
    assert_eq!(cache.get_item::<String>("k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_clear_all_then_exists_is_false() {
    let cache = create_test_cache().await;
    for key in ["a", "b", "c"] {
        cache.set_item(key, key, Some("letters"), None).await.unwrap();
    }

    cache.clear_all().await.unwrap();

    for key in ["a", "b", "c"] {
        assert!(!cache.item_exists(key).await.unwrap());
    }
    let err = cache.get_item::<String>("a").await.unwrap_err();
    assert_eq!(err.to_string(), MSG_NOT_FOUND);
}

#[tokio::test]
async fn test_config_applies_default_ttl() {
    let config = Config {
        default_ttl: Duration::from_millis(100),
        ..Config::default()
    };
    let cache = Cache::from_config(MemoryStore::new(), &config);
    cache.ready().await.unwrap();

    cache.set_item("k", "v", None, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(matches!(
        cache.get_item::<String>("k").await,
        Err(CacheError::Expired { .. })
    ));
}

#[tokio::test]
async fn test_disabled_by_config() {
    let config = Config {
        enabled: false,
        ..Config::default()
    };
    let cache = Cache::from_config(MemoryStore::new(), &config);

    assert!(!cache.is_enabled());
    assert!(matches!(
        cache.set_item("k", "v", None, None).await,
        Err(CacheError::Disabled)
    ));
}

// == File Store ==

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");

    {
        let cache = Cache::new(FileStore::new(&path));
        cache.ready().await.unwrap();
        cache.set_item("a", &json!({"n": 1}), Some("g"), None).await.unwrap();
        cache.set_item("b", &json!({"n": 2}), Some("g"), None).await.unwrap();
        cache.set_item("c", &json!({"n": 3}), None, None).await.unwrap();
    }

    let cache = Cache::new(FileStore::new(&path));
    cache.ready().await.unwrap();
    assert_eq!(cache.get_item::<Value>("a").await.unwrap(), json!({"n": 1}));

    cache.clear_group("g").await.unwrap();
    assert!(!cache.item_exists("a").await.unwrap());
    assert!(!cache.item_exists("b").await.unwrap());
    assert!(cache.item_exists("c").await.unwrap());
}

// == Factory Coordinator ==

#[tokio::test]
async fn test_get_or_set_item_skips_factory_on_hit() {
    let cache = create_test_cache().await;
    let executed = AtomicUsize::new(0);

    let first: u32 = cache
        .get_or_set_item("anotherKey", || async { Ok::<_, String>(10 * 10) }, None, None)
        .await
        .unwrap();
    let second: u32 = cache
        .get_or_set_item(
            "anotherKey",
            || async {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(20 * 20)
            },
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!((first, second), (100, 100));
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_misses_each_run_factory() {
    let cache = create_test_cache().await;
    let runs = Arc::new(AtomicUsize::new(0));

    let (tx_a, rx_a) = tokio::sync::oneshot::channel::<()>();
    let (tx_b, rx_b) = tokio::sync::oneshot::channel::<()>();

    let a = {
        let cache = cache.clone();
        let runs = runs.clone();
        tokio::spawn(async move {
            cache
                .get_or_set_item(
                    "k",
                    || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        let _ = rx_a.await;
                        Ok::<_, String>("a".to_string())
                    },
                    None,
                    None,
                )
                .await
        })
    };
    let b = {
        let cache = cache.clone();
        let runs = runs.clone();
        tokio::spawn(async move {
            cache
                .get_or_set_item(
                    "k",
                    || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        let _ = rx_b.await;
                        Ok::<_, String>("b".to_string())
                    },
                    None,
                    None,
                )
                .await
        })
    };

    // Both factories must be in flight before either completes
    while runs.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }
    tx_a.send(()).unwrap();
    assert_eq!(a.await.unwrap().unwrap(), "a");
    tx_b.send(()).unwrap();
    assert_eq!(b.await.unwrap().unwrap(), "b");

    assert_eq!(cache.get_item::<String>("k").await.unwrap(), "b", "last write wins");
}

// == Stream Adapters ==

#[tokio::test]
async fn test_load_from_future_caches_then_serves() {
    let cache = create_test_cache().await;
    let mock = json!({"hello": "Hello world\"s ", "world": "It's beautiful day"});

    let first: Vec<_> = cache
        .load_from_future("http_cache_test", future::ready(Ok::<_, String>(mock.clone())), None, None)
        .collect()
        .await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].as_ref().unwrap(), &mock);

    let second: Vec<_> = cache
        .load_from_future(
            "http_cache_test",
            future::ready(Ok::<_, String>(json!("never used"))),
            None,
            None,
        )
        .collect()
        .await;
    assert_eq!(second[0].as_ref().unwrap(), &mock);
}

#[tokio::test]
async fn test_load_from_future_error_on_miss() {
    let cache = create_test_cache().await;
    let failure = json!({"status": 503});

    let items: Vec<Result<Value, LoadError<Value>>> = cache
        .load_from_future("http_cache_error_test", future::ready(Err(failure.clone())), None, None)
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    let err = items.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.into_producer(), Some(failure));
    assert!(!cache.item_exists("http_cache_error_test").await.unwrap());
}

#[tokio::test]
async fn test_stale_while_revalidate_all() {
    let cache = create_test_cache().await;
    let ttl = Some(Duration::from_millis(100));
    cache
        .set_item("swr", &json!({"hello": "old"}), Some("fooGroup"), ttl)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let producer = stream::once(future::ready(Ok::<_, String>(json!({"hello": "new"}))));
    let items: Vec<Value> = cache
        .load_from_delayed_stream("swr", producer, Some("fooGroup"), ttl, DelayType::All)
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(items, vec![json!({"hello": "old"}), json!({"hello": "new"})]);
    assert_eq!(cache.get_item::<Value>("swr").await.unwrap(), json!({"hello": "new"}));
}

#[tokio::test]
async fn test_delayed_miss_then_fresh_hit() {
    let cache = create_test_cache().await;
    let ttl = Some(Duration::from_secs(1));

    let first: Vec<_> = cache
        .load_from_delayed_stream(
            "k",
            stream::once(future::ready(Ok::<_, String>(json!("first")))),
            Some("fooGroup"),
            ttl,
            DelayType::None,
        )
        .collect()
        .await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].as_ref().unwrap(), &json!("first"));

    let second: Vec<_> = cache
        .load_from_delayed_stream(
            "k",
            stream::once(future::ready(Ok::<_, String>(json!("second")))),
            Some("fooGroup"),
            ttl,
            DelayType::All,
        )
        .collect()
        .await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].as_ref().unwrap(), &json!("first"));
}

#[tokio::test]
async fn test_delayed_miss_error_is_not_cached() {
    let cache = create_test_cache().await;

    let items: Vec<Result<Value, _>> = cache
        .load_from_delayed_stream(
            "k",
            stream::once(future::ready(Err("unreachable host"))),
            None,
            None,
            DelayType::All,
        )
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(LoadError::Producer("unreachable host"))));
    assert!(!cache.item_exists("k").await.unwrap());
}
