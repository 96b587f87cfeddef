//! Health and metrics endpoints.

use crate::context::AppContext;
use crate::metrics::render_metrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness report. The local cache tier is always available, so the
/// service is ready even while Redis is down.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    pub remote_cache_connected: bool,
    pub realtime_connections: usize,
    pub uptime_secs: u64,
}

pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn readiness_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ReadinessResponse {
        status: "ready".to_string(),
        remote_cache_connected: ctx.cache.is_remote_available(),
        realtime_connections: ctx.router().connected_count(),
        uptime_secs: ctx.started_at.elapsed().as_secs(),
    })
}

pub async fn metrics() -> Response {
    match render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
