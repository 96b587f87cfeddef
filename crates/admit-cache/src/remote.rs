//! Remote cache tier backed by Redis.

use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Batch size hint passed to `SCAN`.
const SCAN_COUNT: usize = 200;

/// Shared out-of-process cache store.
///
/// Values are JSON text. Every method may fail; [`crate::TieredCache`] is
/// responsible for absorbing those failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Get a raw JSON value. `None` if absent or expired.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a raw JSON value with a TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Delete every key matching a glob pattern. Returns the number deleted.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Delete every key owned by this cache.
    async fn flush(&self) -> CacheResult<()>;

    /// Round-trip health check.
    async fn ping(&self) -> CacheResult<()>;
}

/// Redis implementation of [`RemoteTier`].
pub struct RedisRemote {
    pool: Pool,
    operation_timeout: Duration,
    key_prefix: String,
}

impl RedisRemote {
    /// Creates a pool for `url` and verifies it with a `PING`.
    pub async fn connect(
        url: &str,
        pool_size: usize,
        operation_timeout: Duration,
        key_prefix: impl Into<String>,
    ) -> CacheResult<Self> {
        info!("Creating Redis connection pool for remote cache tier...");

        let pool = Config::from_url(url)
            .builder()
            .map_err(|e| CacheError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(pool_size.max(1))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CacheError::Configuration(format!("Failed to create pool: {}", e)))?;

        let remote = Self {
            pool,
            operation_timeout,
            key_prefix: key_prefix.into(),
        };
        remote.ping().await?;

        info!("Redis connection pool created successfully");
        Ok(remote)
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Runs `op` under the configured timeout.
    async fn bounded<T, Fut>(&self, operation: &'static str, op: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = CacheResult<T>>,
    {
        tokio::time::timeout(self.operation_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(operation))?
    }

    async fn conn(&self) -> CacheResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    async fn scan_and_delete(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        let full_pattern = self.key(pattern);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&full_pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::remote("SCAN", e))?;

            if !keys.is_empty() {
                let removed: u64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| CacheError::remote("DEL", e))?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Deleted {} remote keys matching pattern '{}'", deleted, full_pattern);
        Ok(deleted)
    }
}

#[async_trait]
impl RemoteTier for RedisRemote {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.key(key);
        self.bounded("GET", async {
            let mut conn = self.conn().await?;
            let value: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| CacheError::remote("GET", e))?;
            Ok(value)
        })
        .await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let key = self.key(key);
        let ttl_secs = ttl.as_secs().max(1);
        self.bounded("SETEX", async {
            let mut conn = self.conn().await?;
            conn.set_ex::<_, _, ()>(&key, value, ttl_secs)
                .await
                .map_err(|e| CacheError::remote("SETEX", e))?;
            debug!("Cached remote key '{}' with TTL {}s", key, ttl_secs);
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let key = self.key(key);
        self.bounded("DEL", async {
            let mut conn = self.conn().await?;
            let deleted: i64 = conn
                .del(&key)
                .await
                .map_err(|e| CacheError::remote("DEL", e))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.bounded("SCAN", self.scan_and_delete(pattern)).await
    }

    async fn flush(&self) -> CacheResult<()> {
        if !self.key_prefix.is_empty() {
            return self.delete_pattern("*").await.map(|_| ());
        }

        self.bounded("FLUSHDB", async {
            let mut conn = self.conn().await?;
            deadpool_redis::redis::cmd("FLUSHDB")
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| CacheError::remote("FLUSHDB", e))?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.bounded("PING", async {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|e| CacheError::RemoteUnavailable(e.to_string()))?;
            deadpool_redis::redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|e| CacheError::RemoteUnavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }
}
