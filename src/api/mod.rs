//! API endpoints
//!
//! Este módulo contiene los endpoints de diagnóstico: salud, métricas,
//! administración del cache y estado de la base de datos.

pub mod cache;
pub mod database;
pub mod health;
pub mod metrics;

use axum::{
    http::Uri,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::database::Connector;
use crate::middleware::{cache_responses, cors_layer, track_performance, ResponseCache};
use crate::state::AppState;
use crate::utils::AppError;

/// TTL de las estadísticas del servidor de base de datos cacheadas
pub const DATABASE_STATS_CACHE_TTL: u64 = 30;

/// Crear el router de la API
pub fn create_api_router<C: Connector>(state: &AppState<C>) -> Router<AppState<C>> {
    let response_cache = ResponseCache::new(state.cache.clone(), DATABASE_STATS_CACHE_TTL);
    let cached = Router::new()
        .route("/api/database/stats", get(database::database_stats::<C>))
        .route_layer(middleware::from_fn_with_state(response_cache, cache_responses));

    Router::new()
        .route("/api/health", get(health::health_check::<C>))
        .route("/api/metrics", get(metrics::get_metrics::<C>))
        .route("/api/metrics/prometheus", get(metrics::prometheus_metrics::<C>))
        .route("/api/metrics/reset", post(metrics::reset_metrics::<C>))
        .route("/api/cache/stats", get(cache::cache_stats::<C>))
        .route("/api/cache", delete(cache::flush_cache::<C>))
        .route("/api/cache/pattern", delete(cache::invalidate_pattern::<C>))
        .route("/api/database/status", get(database::database_status::<C>))
        .merge(cached)
}

/// Aplicación completa: rutas, medición de rendimiento, trazas y CORS
pub fn create_app<C: Connector>(state: AppState<C>) -> Router {
    let cors = cors_layer(state.config.cors_origins.as_deref());

    create_api_router(&state)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.monitor.clone(),
            track_performance,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Ruta {} no encontrada", uri.path()))
}
