//! Endpoints de estado de la base de datos

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::database::{Connector, DatabaseStats};
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

pub async fn database_status<C: Connector>(State(state): State<AppState<C>>) -> Json<Value> {
    let status = state.database.get_connection_status().await;
    Json(json!({ "success": true, "data": status }))
}

/// Estadísticas del servidor; 503 si la base no está disponible
pub async fn database_stats<C: Connector>(
    State(state): State<AppState<C>>,
) -> AppResult<Json<Value>> {
    match state.database.get_stats().await {
        DatabaseStats::Available(stats) => Ok(Json(json!({ "success": true, "data": stats }))),
        DatabaseStats::Unavailable { error } => Err(AppError::ServiceUnavailable(error)),
    }
}
