mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Method, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use blood_bank_backend::cache::CacheManager;
use blood_bank_backend::middleware::{
    cache_key, cache_responses, track_performance, ResponseCache, CACHE_STATUS_HEADER,
};
use blood_bank_backend::monitoring::{MonitorConfig, PerformanceMonitor};
use common::wait_until;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn inventory(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "success": true, "data": { "call": call } }))
}

async fn rejected(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": false, "message": "sin stock" }))
}

fn cached_router(cache: &CacheManager, calls: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/api/inventory", get(inventory).post(inventory))
        .route("/api/rejected", get(rejected))
        .route_layer(from_fn_with_state(
            ResponseCache::new(cache.clone(), 60),
            cache_responses,
        ))
        .with_state(calls)
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Option<String>, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let cache_status = response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cache_status, body)
}

async fn wait_for_key(cache: &CacheManager, key: &str) -> bool {
    wait_until(Duration::from_secs(2), move || async move { cache.exists(key).await }).await
}

#[tokio::test]
async fn test_second_get_is_served_from_cache() {
    let cache = CacheManager::memory(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    let (status, cache_status, first) = send(&app, Method::GET, "/api/inventory?group=O-").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert!(wait_for_key(&cache, &cache_key("/api/inventory", Some("group=O-"))).await);

    let (status, cache_status, second) = send(&app, Method::GET, "/api/inventory?group=O-").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("HIT"));
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_query_order_shares_entry() {
    let cache = CacheManager::memory(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    send(&app, Method::GET, "/api/inventory?group=O-&city=Lima").await;
    assert!(wait_for_key(&cache, &cache_key("/api/inventory", Some("city=Lima&group=O-"))).await);

    let (_, cache_status, _) = send(&app, Method::GET, "/api/inventory?city=Lima&group=O-").await;
    assert_eq!(cache_status.as_deref(), Some("HIT"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_different_query_is_a_miss() {
    let cache = CacheManager::memory(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    send(&app, Method::GET, "/api/inventory?group=O-").await;
    assert!(wait_for_key(&cache, &cache_key("/api/inventory", Some("group=O-"))).await);

    let (_, cache_status, _) = send(&app, Method::GET, "/api/inventory?group=AB%2B").await;
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_post_bypasses_cache() {
    let cache = CacheManager::memory(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    let (_, cache_status, _) = send(&app, Method::POST, "/api/inventory").await;
    assert_eq!(cache_status, None);
    let (_, cache_status, _) = send(&app, Method::POST, "/api/inventory").await;
    assert_eq!(cache_status, None);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get_stats().await.size, blood_bank_backend::cache::CacheSize::Exact(0));
}

#[tokio::test]
async fn test_unsuccessful_body_is_not_cached() {
    let cache = CacheManager::memory(60);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    let (_, cache_status, _) = send(&app, Method::GET, "/api/rejected").await;
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (_, cache_status, body) = send(&app, Method::GET, "/api/rejected").await;
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(body["success"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disconnected_cache_passes_through() {
    let cache = CacheManager::memory(60);
    cache.disconnect().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let app = cached_router(&cache, calls.clone());

    send(&app, Method::GET, "/api/inventory").await;
    let (status, cache_status, _) = send(&app, Method::GET, "/api/inventory").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

async fn donor(Path(id): Path<u32>) -> Json<Value> {
    Json(json!({ "success": true, "id": id }))
}

fn measured_router(monitor: &PerformanceMonitor) -> Router {
    Router::new()
        .route("/api/donors/:id", get(donor))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(from_fn_with_state(monitor.clone(), track_performance))
}

#[tokio::test]
async fn test_performance_uses_route_template() {
    let monitor = PerformanceMonitor::new(MonitorConfig::default()).unwrap();
    let app = measured_router(&monitor);

    send(&app, Method::GET, "/api/donors/1").await;
    send(&app, Method::GET, "/api/donors/2").await;

    let stats = monitor.endpoint_stats("GET /api/donors/:id").await.unwrap();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_performance_counts_unmatched_routes_as_errors() {
    let monitor = PerformanceMonitor::new(MonitorConfig::default()).unwrap();
    let app = measured_router(&monitor);

    let (status, _, _) = send(&app, Method::GET, "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stats = monitor.endpoint_stats("GET /api/unknown").await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(monitor.get_metrics().await.requests.error_rate, 100.0);
}

#[tokio::test]
async fn test_scanned_paths_do_not_grow_prometheus_series() {
    let monitor = PerformanceMonitor::new(MonitorConfig::default()).unwrap();
    let app = measured_router(&monitor);

    for i in 0..20 {
        send(&app, Method::GET, &format!("/scan/{}", i)).await;
    }
    send(&app, Method::GET, "/api/donors/9").await;

    let exposition = monitor.render_prometheus().unwrap();
    assert!(exposition.contains(r#"route="unmatched""#));
    assert!(exposition.contains(r#"route="/api/donors/:id""#));
    assert!(!exposition.contains("/scan/"));
    let series = exposition
        .lines()
        .filter(|line| line.starts_with("http_requests_total{"))
        .count();
    assert_eq!(series, 2);
}
