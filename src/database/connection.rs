//! Configuración de conexión a PostgreSQL
//!
//! Este módulo abre, verifica y cierra el pool de conexiones. El
//! `DatabaseManager` lo usa a través del trait `Connector`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Row;
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::monitoring::format::format_bytes;

/// Errores de base de datos
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Could not connect after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Destino de la conexión (host, puerto, base)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCounts {
    pub current: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationCounters {
    pub commits: i64,
    pub rollbacks: i64,
    pub inserted: i64,
    pub updated: i64,
    pub deleted: i64,
    pub fetched: i64,
}

/// Estadísticas del servidor de base de datos
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub version: String,
    pub uptime_seconds: f64,
    pub connections: ConnectionCounts,
    pub database_size: String,
    pub database_size_bytes: i64,
    pub opcounters: OperationCounters,
}

/// Driver de conexión usado por el `DatabaseManager`
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Abrir una conexión respetando los timeouts de la configuración
    async fn open(
        &self,
        uri: &str,
        config: &DatabaseConfig,
    ) -> Result<(Self::Handle, ConnectionTarget), DatabaseError>;

    async fn ping(&self, handle: &Self::Handle) -> Result<(), DatabaseError>;

    async fn server_stats(&self, handle: &Self::Handle) -> Result<ServerStats, DatabaseError>;

    async fn close(&self, handle: Self::Handle);
}

/// Conector PostgreSQL basado en sqlx
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

const SERVER_STATS_QUERY: &str = r#"
    SELECT
        current_setting('server_version') AS version,
        EXTRACT(EPOCH FROM (now() - pg_postmaster_start_time()))::float8 AS uptime_seconds,
        (SELECT count(*) FROM pg_stat_activity)::int8 AS current_connections,
        current_setting('max_connections')::int8 AS max_connections,
        pg_database_size(current_database())::int8 AS database_size_bytes,
        d.xact_commit::int8 AS commits,
        d.xact_rollback::int8 AS rollbacks,
        d.tup_inserted::int8 AS inserted,
        d.tup_updated::int8 AS updated,
        d.tup_deleted::int8 AS deleted,
        d.tup_fetched::int8 AS fetched
    FROM pg_stat_database d
    WHERE d.datname = current_database()
"#;

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    async fn open(
        &self,
        uri: &str,
        config: &DatabaseConfig,
    ) -> Result<(PgPool, ConnectionTarget), DatabaseError> {
        let options = PgConnectOptions::from_str(uri)?.options([(
            "statement_timeout",
            config.socket_timeout.as_millis().to_string(),
        )]);

        let target = ConnectionTarget {
            host: options.get_host().to_string(),
            port: options.get_port(),
            name: options.get_database().unwrap_or_default().to_string(),
        };

        let connect = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(options);

        let pool = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| DatabaseError::Timeout(config.connect_timeout))??;

        Ok((pool, target))
    }

    async fn ping(&self, pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    async fn server_stats(&self, pool: &PgPool) -> Result<ServerStats, DatabaseError> {
        let row = sqlx::query(SERVER_STATS_QUERY).fetch_one(pool).await?;
        let size: i64 = row.try_get("database_size_bytes")?;

        Ok(ServerStats {
            version: row.try_get("version")?,
            uptime_seconds: row.try_get("uptime_seconds")?,
            connections: ConnectionCounts {
                current: row.try_get("current_connections")?,
                max: row.try_get("max_connections")?,
            },
            database_size: format_bytes(size.max(0) as u64),
            database_size_bytes: size,
            opcounters: OperationCounters {
                commits: row.try_get("commits")?,
                rollbacks: row.try_get("rollbacks")?,
                inserted: row.try_get("inserted")?,
                updated: row.try_get("updated")?,
                deleted: row.try_get("deleted")?,
                fetched: row.try_get("fetched")?,
            },
        })
    }

    async fn close(&self, pool: PgPool) {
        pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_uri_is_an_error() {
        let config = DatabaseConfig::new("not a uri");
        let result = PgConnector.open("not a uri", &config).await;
        assert!(matches!(result, Err(DatabaseError::Sqlx(_))));
    }

    #[test]
    fn test_retries_exhausted_message() {
        let err = DatabaseError::RetriesExhausted {
            attempts: 3,
            last_error: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not connect after 3 attempts: connection refused"
        );
    }
}
