//! Endpoints de administración del cache

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::database::Connector;
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    pub pattern: Option<String>,
}

pub async fn cache_stats<C: Connector>(State(state): State<AppState<C>>) -> Json<Value> {
    let stats = state.cache.get_stats().await;
    Json(json!({ "success": true, "data": stats }))
}

/// Vaciar el cache completo
pub async fn flush_cache<C: Connector>(State(state): State<AppState<C>>) -> AppResult<Json<Value>> {
    if !state.cache.flush().await {
        return Err(AppError::ServiceUnavailable(
            "El cache no está disponible".to_string(),
        ));
    }

    info!("🧹 Cache vaciado vía API");
    Ok(Json(json!({
        "success": true,
        "message": "Cache vaciado",
    })))
}

/// Invalidar las claves que coinciden con un patrón glob
pub async fn invalidate_pattern<C: Connector>(
    State(state): State<AppState<C>>,
    Query(query): Query<PatternQuery>,
) -> AppResult<Json<Value>> {
    let pattern = query
        .pattern
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| bad_request_error("El parámetro 'pattern' es obligatorio"))?;

    let removed = state.cache.del_pattern(&pattern).await;
    info!("🗑️ Invalidadas {} claves con el patrón {}", removed, pattern);

    Ok(Json(json!({
        "success": true,
        "pattern": pattern,
        "removed": removed,
    })))
}
