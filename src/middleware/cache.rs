//! Middleware de cache de respuestas
//!
//! Cachea las respuestas JSON exitosas de las requests GET. La clave se
//! construye con la ruta y los parámetros de query ordenados, así que
//! `?a=1&b=2` y `?b=2&a=1` comparten entrada.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::utils::errors::AppError;

/// Cabecera que indica si la respuesta salió del cache
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Estado del middleware: cache compartido y TTL de las respuestas
#[derive(Clone)]
pub struct ResponseCache {
    cache: CacheManager,
    ttl: u64,
}

impl ResponseCache {
    pub fn new(cache: CacheManager, ttl: u64) -> Self {
        Self { cache, ttl }
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Clave determinista: `cache:{ruta}:{query serializada}`
///
/// Los parámetros repetidos se agrupan en un array en orden de aparición.
pub fn cache_key(path: &str, query: Option<&str>) -> String {
    let mut params = Map::new();

    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = Value::String(decode_component(value));

        match params.get_mut(&decode_component(name)) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(decode_component(name), value);
            }
        }
    }

    format!("cache:{}:{}", path, Value::Object(params))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Middleware de cache para endpoints de lectura
pub async fn cache_responses(
    State(response_cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(request.uri().path(), request.uri().query());

    if let Some(cached) = response_cache.cache.get::<Value>(&key).await {
        debug!("📥 Respuesta servida desde cache: {}", key);
        let mut response = Json(cached).into_response();
        response
            .headers_mut()
            .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(request).await;
    if !response.status().is_success() || !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("⚠️ No se pudo leer el cuerpo de la respuesta para {}: {}", key, e);
            return AppError::Internal(e.to_string()).into_response();
        }
    };

    // Solo se cachean cuerpos con `"success": true`
    if let Ok(body) = serde_json::from_slice::<Value>(&bytes) {
        if body.get("success").and_then(Value::as_bool) == Some(true) {
            let cache = response_cache.cache.clone();
            let ttl = response_cache.ttl;
            tokio::spawn(async move {
                if cache.set_with_ttl(&key, &body, ttl).await {
                    debug!("💾 Respuesta cacheada: {} (TTL: {}s)", key, ttl);
                }
            });
        }
    }

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_order_independent() {
        assert_eq!(
            cache_key("/api/inventory", Some("group=O-&city=Lima")),
            cache_key("/api/inventory", Some("city=Lima&group=O-"))
        );
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("/api/camps", None), "cache:/api/camps:{}");
        assert_eq!(
            cache_key("/api/camps", Some("city=San+Jos%C3%A9")),
            r#"cache:/api/camps:{"city":"San José"}"#
        );
    }

    #[test]
    fn test_cache_key_repeated_params() {
        assert_eq!(
            cache_key("/api/donors", Some("group=A%2B&group=O-&flag")),
            r#"cache:/api/donors:{"flag":"","group":["A+","O-"]}"#
        );
    }

    #[test]
    fn test_cache_key_distinguishes_paths_and_values() {
        assert_ne!(cache_key("/api/a", Some("x=1")), cache_key("/api/b", Some("x=1")));
        assert_ne!(cache_key("/api/a", Some("x=1")), cache_key("/api/a", Some("x=2")));
    }
}
