//! Endpoint de salud
//!
//! Estado combinado de la base de datos y del cache.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::database::Connector;
use crate::state::AppState;

/// `healthy` con la base conectada, `degraded` (503) si no
pub async fn health_check<C: Connector>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<Value>) {
    let database = state.database.get_connection_status().await;
    let cache = state.cache.get_stats().await;
    let healthy = database.is_connected;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "success": healthy,
            "status": if healthy { "healthy" } else { "degraded" },
            "environment": state.config.environment,
            "database": database,
            "cache": cache,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
