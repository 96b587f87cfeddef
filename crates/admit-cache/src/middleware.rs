//! Response-caching middleware.
//!
//! Wraps a handler so that a `GET` for the same method, path and query is
//! answered from the cache for `ttl` instead of invoking the handler again.

use crate::TieredCache;
use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Request, State},
    handler::Handler,
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header reporting whether a response came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Bodies larger than this, or of unknown length, are passed through
/// uncached.
pub const MAX_CACHED_BODY_BYTES: usize = 8 * 1024 * 1024;

/// A response body captured for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body: String,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = (status, self.body).into_response();

        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
    }
}

/// State for [`cache_response`]: which cache to use and for how long.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Arc<TieredCache>,
    ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(cache: Arc<TieredCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

/// Cache key for a request: method, path and query string.
#[must_use]
pub fn request_key(method: &Method, uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    format!("http:{}:{}", method, target)
}

/// Middleware that serves cached `GET` responses and stores fresh 2xx ones.
pub async fn cache_response(
    State(state): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request_key(request.method(), request.uri());

    if let Some(cached) = state.cache.get::<CachedResponse>(&key).await {
        debug!(key = %key, "Serving cached response");
        let mut response = cached.into_response();
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }
    if !fits_in_cache(&response) {
        debug!(key = %key, "Response body too large or unbounded, not cached");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match std::str::from_utf8(&bytes) {
        Ok(text) => {
            let cached = CachedResponse {
                status: parts.status.as_u16(),
                content_type: parts
                    .headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: text.to_string(),
            };
            state.cache.set(&key, &cached, state.ttl).await;
        }
        Err(_) => debug!(key = %key, "Binary response body not cached"),
    }

    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

/// Whether the body is known to end within [`MAX_CACHED_BODY_BYTES`].
///
/// Streamed bodies report no upper bound and are never buffered.
fn fits_in_cache(response: &Response) -> bool {
    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let upper = response.body().size_hint().upper();

    let limit = MAX_CACHED_BODY_BYTES as u64;
    !declared.is_some_and(|len| len > limit) && upper.is_some_and(|len| len <= limit)
}

/// Wraps `handler` in a `GET` route whose responses are cached for the
/// state's TTL.
pub fn cached_get<H, T, S>(state: ResponseCache, handler: H) -> MethodRouter<S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    get(handler).layer(middleware::from_fn_with_state(state, cache_response))
}
