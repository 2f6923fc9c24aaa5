//! Configuración de cache
//!
//! Este módulo contiene la configuración para el sistema de cache y la
//! política de reintentos del cliente Redis.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuración del cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// URL de Redis; `None` activa el cache en memoria
    pub redis_url: Option<String>,
    pub default_ttl: u64,
    pub retry: RetryPolicy,
    /// Intervalo del PING de mantenimiento contra Redis
    pub heartbeat_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: 3600, // 1 hora
            retry: RetryPolicy::default(),
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

/// Política de reintentos para la conexión inicial a Redis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_total: Duration,
    pub step: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_total: Duration::from_secs(60 * 60),
            step: Duration::from_millis(100),
            max_delay: Duration::from_millis(3000),
        }
    }
}

/// Decisión tras un intento fallido de conexión
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp(&'static str),
}

impl RetryPolicy {
    /// Decidir si reintentar después del intento número `attempt` (desde 1)
    pub fn decide(&self, attempt: u32, elapsed: Duration, refused: bool) -> RetryDecision {
        if refused {
            return RetryDecision::GiveUp("connection refused");
        }
        if elapsed > self.max_total {
            return RetryDecision::GiveUp("retry time exhausted");
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp("retry attempts exhausted");
        }
        RetryDecision::RetryAfter((self.step * attempt).min(self.max_delay))
    }
}
