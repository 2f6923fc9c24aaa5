//! Endpoints de métricas de rendimiento

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use tracing::info;

use crate::database::Connector;
use crate::state::AppState;
use crate::utils::AppResult;

/// Foto de métricas con sugerencias de optimización
pub async fn get_metrics<C: Connector>(State(state): State<AppState<C>>) -> Json<Value> {
    let metrics = state.monitor.get_metrics().await;
    let suggestions = state.monitor.get_optimization_suggestions().await;
    let memory_warning = state.monitor.check_memory_leaks();

    Json(json!({
        "success": true,
        "data": metrics,
        "suggestions": suggestions,
        "memoryWarning": memory_warning,
    }))
}

/// Exposición en formato Prometheus
pub async fn prometheus_metrics<C: Connector>(
    State(state): State<AppState<C>>,
) -> AppResult<impl IntoResponse> {
    let body = state.monitor.render_prometheus()?;
    let content_type = TextEncoder::new().format_type().to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], body))
}

pub async fn reset_metrics<C: Connector>(State(state): State<AppState<C>>) -> Json<Value> {
    state.monitor.reset().await;
    info!("🔄 Métricas reiniciadas vía API");

    Json(json!({
        "success": true,
        "message": "Métricas reiniciadas",
    }))
}
