//! In-process cache tier.

use crate::pattern;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Expiry used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct LocalEntry {
    value: String,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters reported by [`LocalStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStats {
    /// Live (unexpired) entries.
    pub keys: usize,
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing or an expired entry.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before the first read.
    pub hit_rate: f64,
}

/// Per-process key/value store with per-entry expiry.
///
/// Values are stored as JSON text. Expired entries are dropped lazily on
/// access and eagerly by [`LocalStore::purge_expired`].
pub struct LocalStore {
    entries: Mutex<HashMap<String, LocalEntry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalStore {
    /// Creates a store. `max_entries == 0` means unbounded.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the live value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let value = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        drop(entries);

        match &value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Stores `value` under `key`, replacing any previous entry and its TTL.
    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let mut entries = self.entries.lock();

        if self.max_entries > 0
            && entries.len() >= self.max_entries
            && !entries.contains_key(key)
        {
            entries.retain(|_, entry| !entry.is_expired(now));
            if entries.len() >= self.max_entries {
                Self::evict_soonest_expiring(&mut entries);
            }
        }

        entries.insert(
            key.to_string(),
            LocalEntry { value, expires_at },
        );
    }

    fn evict_soonest_expiring(entries: &mut HashMap<String, LocalEntry>) {
        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            debug!(key = %key, "Evicting local cache entry to stay within capacity");
            entries.remove(&key);
        }
    }

    /// Removes `key`. Returns true if a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Removes every key matching the glob `pattern`. Returns the number removed.
    pub fn delete_matching(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !pattern::matches(pattern, key));
        before - entries.len()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drops expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> LocalStats {
        let now = Instant::now();
        let keys = self
            .entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        LocalStats {
            keys,
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new(0)
    }
}
