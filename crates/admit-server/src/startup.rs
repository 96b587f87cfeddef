//! Component construction.

use crate::context::AppContext;
use admit_cache::TieredCache;
use admit_config::{AppConfig, JoinPolicy};
use admit_core::AdmitResult;
use admit_realtime::{RealtimeServer, RoomRouter, TokenVerifier};
use std::sync::Arc;
use tracing::info;

/// Builds the cache and the realtime server from `config`.
///
/// An unreachable Redis never fails startup; the cache runs local-only and
/// its maintenance task keeps retrying.
pub async fn build_context(config: AppConfig) -> AdmitResult<AppContext> {
    let cache = Arc::new(TieredCache::connect(config.cache.clone(), &config.redis).await);
    cache.spawn_maintenance();

    let router = RoomRouter::from_config(&config.realtime);
    let verifier = (config.realtime.join_policy == JoinPolicy::Authenticated)
        .then(|| TokenVerifier::new(&config.security));
    let realtime = RealtimeServer::start(router, config.realtime.clone(), verifier)?;
    info!(
        remote_cache = cache.is_remote_available(),
        join_policy = ?config.realtime.join_policy,
        "Application context built"
    );

    Ok(AppContext::new(config, cache, realtime))
}
