//! Behavioural tests for the tiered cache against an in-memory remote tier.

mod common;

use admit_cache::TieredCache;
use admit_config::CacheConfig;
use common::MemoryRemote;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn cache_with_remote() -> (TieredCache, Arc<MemoryRemote>) {
    let remote = Arc::new(MemoryRemote::new());
    let cache = TieredCache::with_remote(CacheConfig::default(), remote.clone());
    (cache, remote)
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_local_only() {
    let cache = TieredCache::default();
    cache.set("k", &"v", Duration::from_secs(30)).await;
    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.get::<String>("k").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_with_remote() {
    let (cache, remote) = cache_with_remote();
    cache.set("k", &"v", Duration::from_secs(30)).await;
    assert_eq!(remote.peek("k").as_deref(), Some("\"v\""));
    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.get::<String>("k").await, None);
    assert!(cache.is_remote_available());
}

#[tokio::test]
async fn test_overwrite_with_remote() {
    let (cache, _remote) = cache_with_remote();
    cache.set("k", &json!({"v": 1}), Duration::from_secs(60)).await;
    cache.set("k", &json!({"v": 2}), Duration::from_secs(60)).await;
    assert_eq!(
        cache.get::<serde_json::Value>("k").await,
        Some(json!({"v": 2}))
    );
}

#[tokio::test]
async fn test_outage_degrades_to_local_then_recovers() {
    let (cache, remote) = cache_with_remote();
    remote.fail();

    cache.set("during-outage", &1, Duration::from_secs(60)).await;
    assert!(!cache.is_remote_available());
    assert_eq!(cache.get::<i32>("during-outage").await, Some(1));

    remote.recover();
    cache.run_maintenance().await;
    assert!(cache.is_remote_available());

    cache.set("after-outage", &2, Duration::from_secs(60)).await;
    assert_eq!(remote.peek("after-outage").as_deref(), Some("2"));
}

#[tokio::test]
async fn test_remote_shared_between_processes() {
    let remote = Arc::new(MemoryRemote::new());
    let first = TieredCache::with_remote(CacheConfig::default(), remote.clone());
    let second = TieredCache::with_remote(CacheConfig::default(), remote.clone());

    first
        .cache_dashboard_stats("admin", &json!({"total": 42}))
        .await;
    assert_eq!(
        second.get_dashboard_stats::<serde_json::Value>("admin").await,
        Some(json!({"total": 42}))
    );

    second.invalidate_user("u1").await;
    assert_eq!(remote.peek("dashboard:admin:stats"), None);
    assert_eq!(
        second.get_dashboard_stats::<serde_json::Value>("admin").await,
        None
    );
}

#[tokio::test]
async fn test_flush_clears_both_tiers() {
    let (cache, remote) = cache_with_remote();
    cache.set("a", &1, Duration::from_secs(60)).await;
    cache.set("b", &2, Duration::from_secs(60)).await;

    cache.flush().await;

    assert_eq!(remote.peek("a"), None);
    assert_eq!(cache.get::<i32>("a").await, None);
    assert_eq!(cache.stats().local.keys, 0);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_task_purges_expired_entries() {
    let config = CacheConfig {
        sweep_interval_secs: 5,
        ..CacheConfig::default()
    };
    let cache = Arc::new(TieredCache::new(config));
    let handle = cache.spawn_maintenance();

    cache.set("short", &1, Duration::from_secs(2)).await;
    cache.set("long", &2, Duration::from_secs(600)).await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(cache.stats().local.keys, 1);

    drop(cache);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local() {
    let redis = admit_config::RedisConfig {
        url: "redis://127.0.0.1:1".to_string(),
        operation_timeout_ms: 500,
        ..admit_config::RedisConfig::default()
    };
    let cache = TieredCache::connect(CacheConfig::default(), &redis).await;
    assert!(!cache.is_remote_available());

    cache.set("user:1", &json!({"name": "Ada"}), Duration::from_secs(60)).await;
    assert_eq!(cache.get::<serde_json::Value>("user:1").await, Some(json!({"name": "Ada"})));

    assert!(!cache.reconnect().await);
    assert!(!cache.stats().remote.connected);
}

#[tokio::test]
async fn test_overwrite_during_outage_survives_recovery() {
    let (cache, remote) = cache_with_remote();
    cache.set("k", &"v1", Duration::from_secs(60)).await;

    remote.fail();
    cache.set("k", &"v2", Duration::from_secs(60)).await;
    assert!(!cache.is_remote_available());

    remote.recover();
    cache.run_maintenance().await;
    assert!(cache.is_remote_available());
    assert_eq!(remote.peek("k"), None);
    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_delete_during_outage_survives_recovery() {
    let (cache, remote) = cache_with_remote();
    cache
        .set("dashboard:admin:stats", &42, Duration::from_secs(60))
        .await;

    remote.fail();
    cache.del("dashboard:admin:stats").await;

    remote.recover();
    cache.run_maintenance().await;
    assert!(cache.is_remote_available());
    assert_eq!(cache.get::<i32>("dashboard:admin:stats").await, None);
}

#[tokio::test]
async fn test_invalidation_during_outage_survives_recovery() {
    let (cache, remote) = cache_with_remote();
    let ttl = Duration::from_secs(60);
    cache.set("dashboard:admin:stats", &1, ttl).await;
    cache.set("dashboard:staff:stats", &2, ttl).await;
    cache.set("user:1", &3, ttl).await;

    remote.fail();
    cache.set("unrelated", &0, ttl).await;
    cache.invalidate_pattern("dashboard:*:stats").await;
    cache.flush().await;
    cache.set("user:2", &4, ttl).await;

    remote.recover();
    cache.run_maintenance().await;
    assert!(cache.is_remote_available());
    assert_eq!(remote.peek("user:1"), None);
    assert_eq!(cache.get::<i32>("user:1").await, None);
    assert_eq!(cache.get::<i32>("dashboard:staff:stats").await, None);
    assert_eq!(cache.get::<i32>("user:2").await, Some(4));
}
