//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Todo se lee una sola vez al arrancar el proceso.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::CacheConfig;
use crate::config::database::DatabaseConfig;
use crate::monitoring::MonitorConfig;

/// Errores de configuración
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Option<Vec<String>>,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub monitor: MonitorConfig,
}

impl EnvironmentConfig {
    /// Leer la configuración desde las variables de entorno del proceso
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Leer la configuración desde una función de búsqueda arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let mut database = DatabaseConfig::new(database_url);
        database.max_retries = parse_or(&lookup, "DB_MAX_RETRIES", database.max_retries)?;
        database.retry_delay = Duration::from_millis(parse_or(
            &lookup,
            "DB_RETRY_DELAY_MS",
            database.retry_delay.as_millis() as u64,
        )?);
        database.max_connections =
            parse_or(&lookup, "DB_MAX_CONNECTIONS", database.max_connections)?;
        if database.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_RETRIES",
                value: "0".to_string(),
            });
        }

        let mut cache = CacheConfig::default();
        cache.redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        cache.default_ttl = parse_or(&lookup, "CACHE_DEFAULT_TTL", cache.default_ttl)?;
        if cache.default_ttl == 0 {
            return Err(ConfigError::Invalid {
                key: "CACHE_DEFAULT_TTL",
                value: "0".to_string(),
            });
        }

        let mut monitor = MonitorConfig::default();
        monitor.slow_request_threshold_ms = parse_or(
            &lookup,
            "SLOW_REQUEST_THRESHOLD_MS",
            monitor.slow_request_threshold_ms,
        )?;
        let memory_threshold_mb: u64 = parse_or(
            &lookup,
            "MEMORY_THRESHOLD_MB",
            monitor.memory_threshold_bytes / (1024 * 1024),
        )?;
        monitor.memory_threshold_bytes =
            memory_threshold_mb
                .checked_mul(1024 * 1024)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "MEMORY_THRESHOLD_MB",
                    value: memory_threshold_mb.to_string(),
                })?;

        let cors_origins = lookup("CORS_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            cors_origins,
            database,
            cache,
            monitor,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        let config =
            EnvironmentConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/app")]))
                .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.is_development());
        assert!(config.cache.redis_url.is_none());
        assert_eq!(config.cache.default_ttl, 3600);
        assert_eq!(config.monitor.slow_request_threshold_ms, 1000);
        assert_eq!(config.database.max_retries, 5);
        assert!(config.cors_origins.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let result = EnvironmentConfig::from_lookup(lookup_from(&[("PORT", "8080")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let result = EnvironmentConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("PORT", "not-a-port"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "PORT", .. })));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = EnvironmentConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("CACHE_DEFAULT_TTL", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "CACHE_DEFAULT_TTL", .. })));
    }

    #[test]
    fn test_memory_threshold_overflow_rejected() {
        let result = EnvironmentConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("MEMORY_THRESHOLD_MB", "18446744073709551615"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "MEMORY_THRESHOLD_MB", .. })));
    }

    #[test]
    fn test_overrides() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("ENVIRONMENT", "production"),
            ("REDIS_URL", "redis://cache:6379"),
            ("CACHE_DEFAULT_TTL", "120"),
            ("SLOW_REQUEST_THRESHOLD_MS", "250"),
            ("MEMORY_THRESHOLD_MB", "64"),
            ("DB_MAX_RETRIES", "3"),
            ("DB_RETRY_DELAY_MS", "10"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.cache.default_ttl, 120);
        assert_eq!(config.monitor.slow_request_threshold_ms, 250);
        assert_eq!(config.monitor.memory_threshold_bytes, 64 * 1024 * 1024);
        assert_eq!(config.database.max_retries, 3);
        assert_eq!(config.database.retry_delay, Duration::from_millis(10));
        assert_eq!(
            config.cors_origins,
            Some(vec!["https://a.example".to_string(), "https://b.example".to_string()])
        );
    }
}
