//! Contrato común de los backends de cache
//!
//! El backend se elige una sola vez al inicializar el `CacheManager`
//! (Redis o memoria) y no cambia durante la vida del proceso.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::error::CacheError;

/// Tipo de backend activo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Redis => write!(f, "Redis"),
            BackendKind::Memory => write!(f, "Memory"),
        }
    }
}

/// Tamaño aproximado del cache: exacto en memoria, desconocido en Redis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSize {
    Exact(usize),
    Unknown,
}

impl Serialize for CacheSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CacheSize::Exact(n) => serializer.serialize_u64(*n as u64),
            CacheSize::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Operaciones de un backend de cache
///
/// Los valores viajan como `serde_json::Value`; la (de)serialización tipada
/// la hace el `CacheManager`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Devuelve `true` si la clave existía
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Un resultado por clave pedida, en el mismo orden
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError>;

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Elimina las claves que coinciden con un patrón glob de Redis (`*`, `?`, `[...]`, `\`)
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn flush(&self) -> Result<(), CacheError>;

    async fn disconnect(&self);

    async fn size(&self) -> CacheSize;

    fn is_connected(&self) -> bool;

    fn kind(&self) -> BackendKind;
}
