//! # Admit Cache
//!
//! A read/write cache over two tiers: an in-process store that is always
//! written and always available, and an optional Redis store shared between
//! processes. Remote failures never reach the caller; the cache degrades to
//! per-process caching instead.

mod convenience;
pub mod error;
pub mod keys;
mod local;
pub mod metrics;
pub mod middleware;
pub mod pattern;
mod remote;
mod tiered;

pub use error::{CacheError, CacheResult};
pub use local::{LocalStats, LocalStore};
pub use middleware::{cache_response, cached_get, CachedResponse, ResponseCache};
pub use remote::{RedisRemote, RemoteTier};
pub use tiered::{CacheStats, RemoteStats, TieredCache, DEFAULT_TTL, MAX_TTL};
