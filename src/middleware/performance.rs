//! Middleware de rendimiento
//!
//! Mide cada request y la registra en el `PerformanceMonitor`. La respuesta
//! se devuelve intacta.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::monitoring::{PerformanceMonitor, RequestRoute};

/// Middleware de medición de tiempos por endpoint
pub async fn track_performance(
    State(monitor): State<PerformanceMonitor>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    // Sin plantilla de ruta (p. ej. fallback) se usa la ruta cruda
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());
    let raw_path = request.uri().path().to_owned();

    let started = Instant::now();
    let response = next.run(request).await;

    let route = match matched.as_deref() {
        Some(template) => RequestRoute::Matched(template),
        None => RequestRoute::Unmatched(&raw_path),
    };
    monitor
        .record_request(&method, route, started.elapsed(), response.status().as_u16())
        .await;

    response
}
