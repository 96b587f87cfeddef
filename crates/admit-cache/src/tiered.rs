//! Two-tier cache facade.

use crate::local::{LocalStats, LocalStore};
use crate::remote::{RedisRemote, RemoteTier};
use crate::{metrics, CacheError, CacheResult};
use admit_config::{CacheConfig, RedisConfig};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// TTL applied when a caller passes a zero TTL and no other default is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Longest TTL handed to either tier; longer requests are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Remote-tier part of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStats {
    /// Whether remote operations are currently attempted.
    pub connected: bool,
}

/// Snapshot returned by [`TieredCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub local: LocalStats,
    pub remote: RemoteStats,
}

/// Distinct keys remembered during an outage before a full flush is
/// scheduled instead.
const MAX_MISSED_KEYS: usize = 10_000;

/// Changes the remote tier missed while it was switched off.
#[derive(Debug, Default)]
struct MissedChanges {
    keys: HashSet<String>,
    patterns: Vec<String>,
    flush: bool,
}

impl MissedChanges {
    fn is_empty(&self) -> bool {
        !self.flush && self.keys.is_empty() && self.patterns.is_empty()
    }

    fn key(&mut self, key: &str, limit: usize) {
        if self.flush {
            return;
        }
        self.keys.insert(key.to_string());
        if self.keys.len() > limit {
            self.flush_all();
        }
    }

    fn pattern(&mut self, pattern: &str) {
        if !self.flush && !self.patterns.iter().any(|p| p == pattern) {
            self.patterns.push(pattern.to_string());
        }
    }

    fn flush_all(&mut self) {
        self.keys.clear();
        self.patterns.clear();
        self.flush = true;
    }

    fn merge(&mut self, other: MissedChanges) {
        if self.flush {
            return;
        }
        if other.flush {
            self.flush_all();
            return;
        }
        self.keys.extend(other.keys);
        for pattern in other.patterns {
            self.pattern(&pattern);
        }
    }

    /// Removes every stale remote entry these changes cover.
    async fn apply(&self, remote: &dyn RemoteTier) -> CacheResult<()> {
        if self.flush {
            return remote.flush().await;
        }
        for pattern in &self.patterns {
            remote.delete_pattern(pattern).await?;
        }
        for key in &self.keys {
            remote.delete(key).await?;
        }
        Ok(())
    }
}

/// Cache over a local tier and an optional remote tier.
///
/// The local tier is always written and is consulted whenever the remote tier
/// misses, fails or is absent. Each tier expires its own entries. No method
/// returns an error: remote failures are logged, counted and turn the remote
/// tier off until [`Self::reconnect`] succeeds.
///
/// Keys written or deleted while the remote tier is off, patterns invalidated
/// and flushes are remembered. They are removed from the remote tier before
/// it is switched back on, so a recovered remote never serves values that
/// were replaced or deleted during the outage.
pub struct TieredCache {
    local: LocalStore,
    remote: RwLock<Option<Arc<dyn RemoteTier>>>,
    remote_available: AtomicBool,
    redis: RwLock<Option<RedisConfig>>,
    missed: Mutex<MissedChanges>,
    config: CacheConfig,
}

impl TieredCache {
    /// Creates a local-only cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            local: LocalStore::new(config.local_max_entries),
            remote: RwLock::new(None),
            remote_available: AtomicBool::new(false),
            redis: RwLock::new(None),
            missed: Mutex::new(MissedChanges::default()),
            config,
        }
    }

    /// Creates a cache with an already-connected remote tier.
    #[must_use]
    pub fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteTier>) -> Self {
        let cache = Self::new(config);
        cache.attach_remote(remote);
        cache
    }

    /// Creates a cache and tries to connect the remote tier described by `redis`.
    pub async fn connect(config: CacheConfig, redis: &RedisConfig) -> Self {
        let cache = Self::new(config);
        cache.configure(redis).await;
        cache
    }

    /// Attempts to connect the remote tier.
    ///
    /// Never fails: an absent URL or a failed connection leaves the cache in
    /// local-only mode.
    pub async fn configure(&self, redis: &RedisConfig) {
        let Some(url) = redis.connection_url() else {
            info!("Remote cache tier not configured, using local cache only");
            return;
        };
        *self.redis.write() = Some(redis.clone());

        match RedisRemote::connect(
            url,
            redis.pool_size,
            redis.operation_timeout(),
            redis.key_prefix.clone(),
        )
        .await
        {
            Ok(remote) => {
                if self.resume(Arc::new(remote)).await {
                    info!("Remote cache tier connected");
                }
            }
            Err(e) => {
                warn!(error = %e, "Remote cache tier unavailable, using local cache only");
            }
        }
    }

    /// Installs `remote` and marks it available.
    pub fn attach_remote(&self, remote: Arc<dyn RemoteTier>) {
        *self.remote.write() = Some(remote);
        self.remote_available.store(true, Ordering::SeqCst);
    }

    /// Whether remote operations are currently attempted.
    #[must_use]
    pub fn is_remote_available(&self) -> bool {
        self.remote_available.load(Ordering::SeqCst)
    }

    /// Pings the remote tier and re-enables it on success. If the initial
    /// connection never succeeded, connecting is attempted again.
    pub async fn reconnect(&self) -> bool {
        let remote = self.remote.read().clone();
        let Some(remote) = remote else {
            let redis = self.redis.read().clone();
            if let Some(redis) = redis {
                self.configure(&redis).await;
            }
            return self.is_remote_available();
        };

        if self.is_remote_available() {
            return true;
        }

        match remote.ping().await {
            Ok(()) => {
                let resumed = self.resume(remote).await;
                if resumed {
                    info!("Remote cache tier reachable again");
                }
                resumed
            }
            Err(e) => {
                debug!(error = %e, "Remote cache tier still unavailable");
                false
            }
        }
    }

    /// Installs `remote`, removes the entries it missed and only then marks
    /// it available.
    async fn resume(&self, remote: Arc<dyn RemoteTier>) -> bool {
        *self.remote.write() = Some(remote.clone());

        loop {
            let pending = std::mem::take(&mut *self.missed.lock());
            if pending.is_empty() {
                let missed = self.missed.lock();
                if missed.is_empty() {
                    self.remote_available.store(true, Ordering::SeqCst);
                    return true;
                }
                continue;
            }

            debug!(
                keys = pending.keys.len(),
                patterns = pending.patterns.len(),
                flush = pending.flush,
                "Clearing remote entries changed during outage"
            );
            if let Err(e) = pending.apply(remote.as_ref()).await {
                metrics::remote_error("resync", e.kind());
                debug!(error = %e, "Remote cache tier failed during resync");
                self.missed.lock().merge(pending);
                return false;
            }
        }
    }

    /// Whether a remote tier exists or is expected to come back.
    fn remote_expected(&self) -> bool {
        self.remote.read().is_some() || self.redis.read().is_some()
    }

    fn missed_key(&self, key: &str) {
        if self.remote_expected() {
            self.missed.lock().key(key, MAX_MISSED_KEYS);
        }
    }

    fn missed_pattern(&self, pattern: &str) {
        if self.remote_expected() {
            self.missed.lock().pattern(pattern);
        }
    }

    fn missed_flush(&self) {
        if self.remote_expected() {
            self.missed.lock().flush_all();
        }
    }

    /// The configuration this cache was built with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn active_remote(&self) -> Option<Arc<dyn RemoteTier>> {
        if !self.is_remote_available() {
            return None;
        }
        self.remote.read().clone()
    }

    fn remote_failed(&self, operation: &'static str, key: &str, err: &CacheError) {
        metrics::remote_error(operation, err.kind());
        if self.remote_available.swap(false, Ordering::SeqCst) {
            warn!(
                operation,
                key = %key,
                error = %err,
                "Remote cache tier failed, falling back to local cache"
            );
        } else {
            debug!(operation, key = %key, error = %err, "Remote cache tier failed");
        }
    }

    fn effective_ttl(&self, ttl: Duration) -> Duration {
        let ttl = if !ttl.is_zero() {
            ttl
        } else if self.config.default_ttl_secs > 0 {
            self.config.default_ttl()
        } else {
            DEFAULT_TTL
        };
        ttl.min(MAX_TTL)
    }

    /// Reads the raw JSON stored under `key`.
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(remote) = self.active_remote() {
            match remote.get_raw(key).await {
                Ok(Some(value)) => {
                    debug!(key = %key, tier = "remote", "Cache hit");
                    metrics::hit("remote");
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => self.remote_failed("get", key, &e),
            }
        }

        match self.local.get(key) {
            Some(value) => {
                debug!(key = %key, tier = "local", "Cache hit");
                metrics::hit("local");
                Some(value)
            }
            None => {
                debug!(key = %key, "Cache miss");
                metrics::miss();
                None
            }
        }
    }

    /// Writes raw JSON under `key`. A zero TTL means the configured default.
    pub async fn set_raw(&self, key: &str, value: String, ttl: Duration) {
        let ttl = self.effective_ttl(ttl);
        let remote = self.active_remote();

        self.local.set(key, value.clone(), ttl);

        match remote {
            Some(remote) => {
                if let Err(e) = remote.set_raw(key, &value, ttl).await {
                    self.remote_failed("set", key, &e);
                    self.missed_key(key);
                }
            }
            None => self.missed_key(key),
        }
    }

    /// Reads and deserializes the value under `key`.
    ///
    /// Undecodable data is treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Serializes and stores `value` under `key`.
    ///
    /// A value that cannot be serialized is not stored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(json) => self.set_raw(key, json, ttl).await,
            Err(e) => warn!(key = %key, error = %e, "Value not cacheable, skipping"),
        }
    }

    /// Removes `key` from both tiers. Missing keys are not an error.
    pub async fn del(&self, key: &str) {
        match self.active_remote() {
            Some(remote) => {
                if let Err(e) = remote.delete(key).await {
                    self.remote_failed("del", key, &e);
                    self.missed_key(key);
                }
            }
            None => self.missed_key(key),
        }
        self.local.delete(key);
    }

    /// Removes every entry from both tiers.
    pub async fn flush(&self) {
        match self.active_remote() {
            Some(remote) => {
                if let Err(e) = remote.flush().await {
                    self.remote_failed("flush", "*", &e);
                    self.missed_flush();
                }
            }
            None => self.missed_flush(),
        }
        self.local.clear();
        info!("Cache flushed");
    }

    /// Removes every key matching the glob `pattern` from both tiers.
    ///
    /// Returns the number of local entries removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        match self.active_remote() {
            Some(remote) => match remote.delete_pattern(pattern).await {
                Ok(n) => debug!(pattern = %pattern, removed = n, "Remote keys invalidated"),
                Err(e) => {
                    self.remote_failed("invalidate", pattern, &e);
                    self.missed_pattern(pattern);
                }
            },
            None => self.missed_pattern(pattern),
        }

        let removed = self.local.delete_matching(pattern);
        debug!(pattern = %pattern, removed, "Local keys invalidated");
        removed
    }

    /// Returns the cached value or computes, stores and returns it.
    ///
    /// Errors from `factory` are returned as-is and nothing is stored.
    pub async fn get_or_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local: self.local.stats(),
            remote: RemoteStats {
                connected: self.is_remote_available(),
            },
        }
    }

    /// Purges expired local entries and retries a failed remote tier.
    pub async fn run_maintenance(&self) {
        let purged = self.local.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired local cache entries");
        }

        if !self.is_remote_available() {
            self.reconnect().await;
        }
    }

    /// Spawns [`Self::run_maintenance`] on the configured interval.
    ///
    /// The task ends once the cache is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval().max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.run_maintenance().await;
            }
        })
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteTier;
    use serde_json::json;

    fn down() -> CacheError {
        CacheError::RemoteUnavailable("connection refused".to_string())
    }

    fn always_failing_remote() -> MockRemoteTier {
        let mut remote = MockRemoteTier::new();
        remote.expect_get_raw().returning(|_| Err(down()));
        remote.expect_set_raw().returning(|_, _, _| Err(down()));
        remote.expect_delete().returning(|_| Err(down()));
        remote.expect_delete_pattern().returning(|_| Err(down()));
        remote.expect_flush().returning(|| Err(down()));
        remote.expect_ping().returning(|| Err(down()));
        remote
    }

    #[tokio::test]
    async fn test_local_only_set_then_get() {
        let cache = TieredCache::default();
        assert!(!cache.is_remote_available());

        cache.set("user:1", &json!({"name": "Ada"}), Duration::from_secs(60)).await;
        let value: Option<serde_json::Value> = cache.get("user:1").await;
        assert_eq!(value, Some(json!({"name": "Ada"})));
    }

    #[tokio::test]
    async fn test_overwrite_returns_latest() {
        let cache = TieredCache::default();
        cache.set("k", &1, Duration::from_secs(60)).await;
        cache.set("k", &2, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<i32>("k").await, Some(2));
    }

    #[tokio::test]
    async fn test_failing_remote_behaves_like_local_only() {
        let cache = TieredCache::with_remote(
            CacheConfig::default(),
            Arc::new(always_failing_remote()),
        );
        assert!(cache.is_remote_available());

        cache.set("k", &"v", Duration::from_secs(60)).await;
        assert!(!cache.is_remote_available());
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));

        cache.del("k").await;
        assert_eq!(cache.get::<String>("k").await, None);

        cache.set("a", &1, Duration::from_secs(60)).await;
        cache.flush().await;
        assert_eq!(cache.get::<i32>("a").await, None);
        assert!(!cache.reconnect().await);
    }

    #[tokio::test]
    async fn test_failure_on_read_falls_back_to_local() {
        let mut remote = MockRemoteTier::new();
        remote.expect_set_raw().returning(|_, _, _| Ok(()));
        remote.expect_get_raw().times(1).returning(|_| Err(down()));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("k", &"local", Duration::from_secs(60)).await;

        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("local"));
        assert!(!cache.stats().remote.connected);
    }

    #[tokio::test]
    async fn test_remote_hit_is_preferred() {
        let mut remote = MockRemoteTier::new();
        remote
            .expect_get_raw()
            .withf(|key| key == "dashboard:admin:stats")
            .returning(|_| Ok(Some(r#"{"total":42}"#.to_string())));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        let value: Option<serde_json::Value> = cache.get("dashboard:admin:stats").await;
        assert_eq!(value, Some(json!({"total": 42})));
    }

    #[tokio::test]
    async fn test_remote_miss_falls_back_to_local() {
        let mut remote = MockRemoteTier::new();
        remote.expect_set_raw().returning(|_, _, _| Ok(()));
        remote.expect_get_raw().returning(|_| Ok(None));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("k", &7, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<i32>("k").await, Some(7));
        assert!(cache.is_remote_available());
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers_with_same_ttl() {
        let mut remote = MockRemoteTier::new();
        remote
            .expect_set_raw()
            .withf(|key, value, ttl| {
                key == "user:9" && value == "\"x\"" && *ttl == Duration::from_secs(1800)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("user:9", &"x", Duration::from_secs(1800)).await;
        assert_eq!(cache.stats().local.keys, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let mut remote = MockRemoteTier::new();
        remote
            .expect_set_raw()
            .withf(|_, _, ttl| *ttl == DEFAULT_TTL)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("k", &true, Duration::ZERO).await;
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped_for_both_tiers() {
        let mut remote = MockRemoteTier::new();
        remote
            .expect_set_raw()
            .withf(|_, _, ttl| *ttl == MAX_TTL)
            .times(1)
            .returning(|_, _, _| Ok(()));
        remote.expect_get_raw().returning(|_| Ok(None));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("k", &1, Duration::MAX).await;
        assert_eq!(cache.get::<i32>("k").await, Some(1));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = TieredCache::default();
        cache
            .set_raw("k", "not json".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_hits_both_tiers() {
        let mut remote = MockRemoteTier::new();
        remote.expect_set_raw().returning(|_, _, _| Ok(()));
        remote
            .expect_delete_pattern()
            .withf(|pattern| pattern == "dashboard:*:stats")
            .times(1)
            .returning(|_| Ok(2));
        remote.expect_get_raw().returning(|_| Ok(None));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        let ttl = Duration::from_secs(60);
        cache.set("dashboard:admin:stats", &1, ttl).await;
        cache.set("dashboard:staff:stats", &2, ttl).await;
        cache.set("user:1", &3, ttl).await;

        assert_eq!(cache.invalidate_pattern("dashboard:*:stats").await, 2);
        assert_eq!(cache.get::<i32>("dashboard:admin:stats").await, None);
        assert_eq!(cache.get::<i32>("user:1").await, Some(3));
    }

    #[tokio::test]
    async fn test_dashboard_set_get_delete_scenario() {
        let cache = TieredCache::default();
        cache
            .set("dashboard:admin:stats", &json!({"total": 42}), Duration::from_secs(300))
            .await;
        assert_eq!(
            cache.get::<serde_json::Value>("dashboard:admin:stats").await,
            Some(json!({"total": 42}))
        );

        cache.del("dashboard:admin:stats").await;
        assert_eq!(cache.get::<serde_json::Value>("dashboard:admin:stats").await, None);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_calls_factory_once() {
        let cache = TieredCache::default();
        let mut calls = 0;

        for _ in 0..3 {
            let value: Result<u32, std::convert::Infallible> = cache
                .get_or_insert_with("computed", Duration::from_secs(60), || {
                    calls += 1;
                    async { Ok(99) }
                })
                .await;
            assert_eq!(value, Ok(99));
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_does_not_store_errors() {
        let cache = TieredCache::default();
        let result: Result<u32, &str> = cache
            .get_or_insert_with("k", Duration::from_secs(60), || async { Err("db down") })
            .await;
        assert_eq!(result, Err("db down"));
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_reconnect_restores_remote() {
        let mut remote = MockRemoteTier::new();
        remote.expect_get_raw().times(1).returning(|_| Err(down()));
        remote.expect_ping().times(1).returning(|| Ok(()));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        assert_eq!(cache.get::<i32>("k").await, None);
        assert!(!cache.is_remote_available());

        cache.run_maintenance().await;
        assert!(cache.is_remote_available());
    }

    #[tokio::test]
    async fn test_reconnect_clears_entries_changed_during_outage() {
        let mut remote = MockRemoteTier::new();
        remote.expect_set_raw().times(1).returning(|_, _, _| Err(down()));
        remote.expect_ping().times(1).returning(|| Ok(()));
        remote
            .expect_delete_pattern()
            .withf(|pattern| pattern == "dashboard:*:stats")
            .times(1)
            .returning(|_| Ok(1));
        remote
            .expect_delete()
            .withf(|key| key == "user:1")
            .times(1)
            .returning(|_| Ok(true));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.set("user:1", &1, Duration::from_secs(60)).await;
        assert!(!cache.is_remote_available());
        cache.invalidate_pattern("dashboard:*:stats").await;

        assert!(cache.reconnect().await);
        assert!(cache.is_remote_available());
    }

    #[tokio::test]
    async fn test_flush_during_outage_flushes_remote_on_reconnect() {
        let mut remote = MockRemoteTier::new();
        remote.expect_delete().times(1).returning(|_| Err(down()));
        remote.expect_ping().times(1).returning(|| Ok(()));
        remote.expect_flush().times(1).returning(|| Ok(()));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.del("user:1").await;
        cache.set("user:2", &2, Duration::from_secs(60)).await;
        cache.flush().await;

        assert!(cache.reconnect().await);
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_remote_off_and_retries() {
        let mut remote = MockRemoteTier::new();
        let mut seq = mockall::Sequence::new();
        remote
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(down()));
        remote
            .expect_ping()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        remote
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(down()));
        remote
            .expect_ping()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        remote
            .expect_delete()
            .withf(|key| key == "k")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let cache = TieredCache::with_remote(CacheConfig::default(), Arc::new(remote));
        cache.del("k").await;

        assert!(!cache.reconnect().await);
        assert!(!cache.is_remote_available());
        assert!(cache.reconnect().await);
    }

    #[tokio::test]
    async fn test_local_only_cache_records_nothing() {
        let cache = TieredCache::default();
        cache.set("k", &1, Duration::from_secs(60)).await;
        cache.flush().await;
        assert!(cache.missed.lock().is_empty());
    }

    #[test]
    fn test_missed_keys_over_limit_become_flush() {
        let mut missed = MissedChanges::default();
        missed.key("a", 2);
        missed.key("b", 2);
        assert!(!missed.flush);
        missed.key("c", 2);
        assert!(missed.flush);
        assert!(missed.keys.is_empty());
    }

    #[tokio::test]
    async fn test_configure_without_url_stays_local() {
        let redis = RedisConfig {
            enabled: false,
            ..RedisConfig::default()
        };
        let cache = TieredCache::connect(CacheConfig::default(), &redis).await;
        assert!(!cache.is_remote_available());
        assert!(!cache.reconnect().await);
    }

    #[tokio::test]
    async fn test_stats_shape() {
        let cache = TieredCache::default();
        cache.set("k", &1, Duration::from_secs(60)).await;
        cache.get::<i32>("k").await;
        cache.get::<i32>("missing").await;

        let stats = serde_json::to_value(cache.stats()).unwrap();
        assert_eq!(stats["local"]["keys"], 1);
        assert_eq!(stats["local"]["hits"], 1);
        assert_eq!(stats["local"]["misses"], 1);
        assert_eq!(stats["local"]["hitRate"], 0.5);
        assert_eq!(stats["remote"]["connected"], false);
    }
}
