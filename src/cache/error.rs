//! Errores del cache

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend disconnected")]
    Disconnected,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("TTL out of range: {0:?}")]
    TtlOutOfRange(Duration),
}

impl CacheError {
    /// Indica si el error significa que el servidor ya no es alcanzable
    pub fn is_connection_error(&self) -> bool {
        match self {
            CacheError::Disconnected => true,
            CacheError::Redis(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
            }
            _ => false,
        }
    }
}
