//! Tests for the response-caching middleware.

use admit_cache::{cache_response, cached_get, ResponseCache, TieredCache};
use axum::{
    body::Body,
    extract::Query,
    http::{Request, StatusCode},
    middleware,
    routing::post,
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(calls: Arc<AtomicUsize>, cache: Arc<TieredCache>) -> Router {
    let state = ResponseCache::new(cache, Duration::from_secs(60));

    let counted = calls.clone();
    let stats = move |Query(params): Query<HashMap<String, String>>| {
        let counted = counted.clone();
        async move {
            let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
            Json(json!({ "call": n, "role": params.get("role") }))
        }
    };

    let failing = || async { (StatusCode::SERVICE_UNAVAILABLE, "try later") };

    let posted = calls;
    let submit = move || {
        let posted = posted.clone();
        async move { Json(json!({ "call": posted.fetch_add(1, Ordering::SeqCst) + 1 })) }
    };

    Router::new()
        .route("/stats", cached_get(state.clone(), stats))
        .route("/flaky", cached_get(state.clone(), failing))
        .route(
            "/submit",
            post(submit).layer(middleware::from_fn_with_state(state, cache_response)),
        )
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Option<String>, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let x_cache = response
        .headers()
        .get("x-cache")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, x_cache, body)
}

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(calls.clone(), Arc::new(TieredCache::default()));

    let (status, x_cache, body) = send(&app, "GET", "/stats?role=admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("MISS"));
    assert_eq!(body["call"], 1);

    let (status, x_cache, body) = send(&app, "GET", "/stats?role=admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("HIT"));
    assert_eq!(body, json!({"call": 1, "role": "admin"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_query_is_part_of_the_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(calls.clone(), Arc::new(TieredCache::default()));

    send(&app, "GET", "/stats?role=admin").await;
    let (_, x_cache, body) = send(&app, "GET", "/stats?role=staff").await;
    assert_eq!(x_cache.as_deref(), Some("MISS"));
    assert_eq!(body["role"], "staff");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let cache = Arc::new(TieredCache::default());
    let app = app(Arc::new(AtomicUsize::new(0)), cache.clone());

    let (status, x_cache, _) = send(&app, "GET", "/flaky").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(x_cache, None);
    assert_eq!(cache.stats().local.keys, 0);
}

#[tokio::test]
async fn test_non_get_requests_bypass_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(calls.clone(), Arc::new(TieredCache::default()));

    send(&app, "POST", "/submit").await;
    let (_, x_cache, body) = send(&app, "POST", "/submit").await;
    assert_eq!(x_cache, None);
    assert_eq!(body["call"], 2);
}

#[tokio::test]
async fn test_flush_forces_handler_again() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(TieredCache::default());
    let app = app(calls.clone(), cache.clone());

    send(&app, "GET", "/stats").await;
    cache.flush().await;
    let (_, x_cache, _) = send(&app, "GET", "/stats").await;
    assert_eq!(x_cache.as_deref(), Some("MISS"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_large_streamed_response_passes_through() {
    const CHUNK: usize = 1024 * 1024;

    let cache = Arc::new(TieredCache::default());
    let state = ResponseCache::new(cache.clone(), Duration::from_secs(60));
    let export = || async {
        let chunks = (0..9).map(|_| Ok::<_, std::io::Error>(vec![b'x'; CHUNK]));
        Body::from_stream(futures::stream::iter(chunks))
    };
    let app = Router::new().route("/export", cached_get(state, export));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-cache").is_none());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.len(), 9 * CHUNK);
    assert_eq!(cache.stats().local.keys, 0);
}
