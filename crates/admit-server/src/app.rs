//! Application router.

use crate::context::AppContext;
use crate::middleware::logging_middleware;
use crate::routes::{cache, health, realtime};
use admit_config::ServerConfig;
use axum::{http::HeaderValue, middleware, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Builds the full router over `ctx`.
pub fn create_router(ctx: AppContext) -> Router {
    let cors = create_cors_layer(&ctx.config.server);
    let timeout = ctx.config.server.request_timeout();

    let router = Router::new()
        .merge(health::router())
        .merge(cache::router())
        .merge(realtime::router(&ctx))
        .with_state(ctx.clone())
        .merge(ctx.realtime.routes())
        .layer(cors)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware));

    info!(ws_path = %ctx.realtime.config().path, "Router created");
    router
}

fn create_cors_layer(server_config: &ServerConfig) -> CorsLayer {
    if server_config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server_config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
