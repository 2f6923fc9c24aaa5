//! Gestor de cache
//!
//! Fachada única sobre el backend activo. Ningún método público propaga
//! errores: los fallos se registran y se devuelven como ausencia o `false`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::backend::{BackendKind, CacheBackend, CacheSize};
use super::cache_config::CacheConfig;
use super::error::CacheError;
use super::memory::MemoryCache;
use super::redis_client::RedisClient;

/// Estadísticas del cache
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub is_connected: bool,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub size: CacheSize,
}

/// Cache compartido por toda la aplicación
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    default_ttl: u64,
}

impl CacheManager {
    /// Inicializar el cache: Redis si está configurado y responde, memoria si no
    pub async fn init(config: &CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = match config.redis_url.as_deref() {
            Some(url) => match RedisClient::connect(config, url).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!("⚠️ Redis no disponible ({}), usando cache en memoria", e);
                    Arc::new(MemoryCache::new())
                }
            },
            None => {
                info!("ℹ️ REDIS_URL no configurada, usando cache en memoria");
                Arc::new(MemoryCache::new())
            }
        };

        Self::with_backend(backend, config.default_ttl)
    }

    /// Cache en memoria con el TTL por defecto indicado
    pub fn memory(default_ttl: u64) -> Self {
        Self::with_backend(Arc::new(MemoryCache::new()), default_ttl)
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>, default_ttl: u64) -> Self {
        Self {
            backend,
            default_ttl: default_ttl.max(1),
        }
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn log_failure(&self, operation: &str, key: &str, error: &CacheError) {
        if matches!(error, CacheError::Disconnected) {
            warn!("⚠️ Cache {} no disponible para {} (backend desconectado)", operation, key);
        } else {
            warn!("⚠️ Error en cache {} para clave {}: {}", operation, key, error);
        }
    }

    /// Obtener un valor; `None` si no existe, expiró o el backend no responde
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.backend.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                self.log_failure("GET", key, &e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.log_failure("GET", key, &CacheError::Serialization(e));
                None
            }
        }
    }

    /// Guardar un valor con el TTL por defecto
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Guardar un valor con un TTL en segundos (0 usa el TTL por defecto)
    pub async fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: u64) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                self.log_failure("SET", key, &CacheError::Serialization(e));
                return false;
            }
        };
        let ttl = if ttl == 0 { self.default_ttl } else { ttl };

        match self.backend.set(key, value, Duration::from_secs(ttl)).await {
            Ok(()) => true,
            Err(e) => {
                self.log_failure("SET", key, &e);
                false
            }
        }
    }

    /// Eliminar una clave y cancelar su expiración pendiente
    pub async fn del(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(_) => true,
            Err(e) => {
                self.log_failure("DEL", key, &e);
                false
            }
        }
    }

    /// Eliminar todas las claves que coinciden con un patrón glob de Redis
    /// (`*`, `?`, `[...]`, `\`)
    pub async fn del_pattern(&self, pattern: &str) -> u64 {
        match self.backend.delete_pattern(pattern).await {
            Ok(removed) => removed,
            Err(e) => {
                self.log_failure("DEL", pattern, &e);
                0
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                self.log_failure("EXISTS", key, &e);
                false
            }
        }
    }

    /// TTL restante en segundos
    pub async fn ttl(&self, key: &str) -> Option<u64> {
        match self.backend.ttl(key).await {
            Ok(ttl) => ttl.map(|d| d.as_secs()),
            Err(e) => {
                self.log_failure("TTL", key, &e);
                None
            }
        }
    }

    /// Obtener varias claves; siempre hay una entrada por clave pedida
    pub async fn get_multiple<T: DeserializeOwned>(&self, keys: &[&str]) -> HashMap<String, Option<T>> {
        let owned: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let values: Vec<Option<Value>> = match self.backend.get_many(&owned).await {
            Ok(values) if values.len() == owned.len() => values,
            Ok(_) => {
                warn!("⚠️ Respuesta incompleta de cache para {} claves", owned.len());
                vec![None; owned.len()]
            }
            Err(e) => {
                self.log_failure("MGET", &owned.join(","), &e);
                vec![None; owned.len()]
            }
        };

        owned
            .into_iter()
            .zip(values)
            .map(|(key, value)| {
                let parsed = value.and_then(|v| serde_json::from_value(v).ok());
                (key, parsed)
            })
            .collect()
    }

    /// Vaciar el cache completo
    pub async fn flush(&self) -> bool {
        match self.backend.flush().await {
            Ok(()) => true,
            Err(e) => {
                self.log_failure("FLUSH", "*", &e);
                false
            }
        }
    }

    /// Cerrar el backend; llamadas repetidas no tienen efecto
    pub async fn disconnect(&self) {
        self.backend.disconnect().await;
    }

    pub async fn get_stats(&self) -> CacheStats {
        CacheStats {
            is_connected: self.backend.is_connected(),
            kind: self.backend.kind(),
            size: self.backend.size().await,
        }
    }
}
