//! Shared fixtures for cache integration tests.

use admit_cache::{CacheError, CacheResult, RemoteTier};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory stand-in for Redis that honours TTLs and can be switched off.
#[derive(Default)]
pub struct MemoryRemote {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    failing: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes calls succeed again.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Raw value currently stored remotely, ignoring the failure switch.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(value, _)| value.clone())
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::RemoteUnavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTier for MemoryRemote {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !admit_cache::pattern::matches(pattern, key));
        Ok((before - entries.len()) as u64)
    }

    async fn flush(&self) -> CacheResult<()> {
        self.check()?;
        self.entries.lock().clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}
