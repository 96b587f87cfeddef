//! Cache administration endpoints.

use crate::context::AppContext;
use admit_cache::CacheStats;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/api/cache", axum::routing::delete(flush))
        .route("/api/cache/stats", get(stats))
}

pub async fn stats(State(ctx): State<AppContext>) -> Json<CacheStats> {
    Json(ctx.cache.stats())
}

/// Clears both tiers.
pub async fn flush(State(ctx): State<AppContext>) -> StatusCode {
    ctx.cache.flush().await;
    info!("Cache flushed via API");
    StatusCode::NO_CONTENT
}
