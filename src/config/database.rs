//! Configuración de base de datos
//!
//! Este módulo define el pool, los timeouts y la política de reintentos
//! de la conexión a PostgreSQL.

use std::time::Duration;

/// Configuración de la base de datos
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Tiempo máximo para obtener una conexión del pool (selección de servidor)
    pub acquire_timeout: Duration,
    /// Tiempo máximo para abrir la conexión inicial
    pub connect_timeout: Duration,
    /// Timeout de socket, aplicado como `statement_timeout` en el servidor
    pub socket_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// Intentos de conexión inicial antes de abortar
    pub max_retries: u32,
    /// Espera fija entre intentos (inicial y reconexión)
    pub retry_delay: Duration,
    /// Intervalo del chequeo de salud de la conexión
    pub health_check_interval: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(45),
            idle_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800),
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(10),
        }
    }
}

/// Función helper para enmascarar la URL de la base de datos en logs
pub fn mask_database_url(url: &str) -> String {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url.rfind('@') {
        Some(at_pos) if at_pos > scheme_end => {
            let credentials = &url[scheme_end..at_pos];
            let user = credentials.split(':').next().unwrap_or("");
            format!("{}{}:***{}", &url[..scheme_end], user, &url[at_pos..])
        }
        _ => url.to_string(),
    }
}
