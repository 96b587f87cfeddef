//! Realtime observability and announcement endpoints.

use crate::context::AppContext;
use admit_cache::{cached_get, ResponseCache};
use admit_realtime::{DeliveryReport, Notification, RouterStats};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::time::Duration;

/// How long `/api/realtime/stats` responses are served from the cache.
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(5);

pub fn router(ctx: &AppContext) -> Router<AppContext> {
    let stats_cache = ResponseCache::new(ctx.cache.clone(), STATS_CACHE_TTL);

    Router::new()
        .route("/api/realtime/stats", cached_get(stats_cache, stats))
        .route("/api/realtime/announcements", post(announce))
}

pub async fn stats(State(ctx): State<AppContext>) -> Json<RouterStats> {
    Json(ctx.router().stats())
}

/// Sends an announcement to every connected client.
pub async fn announce(
    State(ctx): State<AppContext>,
    Json(notification): Json<Notification>,
) -> (StatusCode, Json<DeliveryReport>) {
    let report = ctx.router().send_announcement(&notification);
    (StatusCode::ACCEPTED, Json(report))
}
