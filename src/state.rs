//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Cada componente se construye una sola vez
//! en `main` y se comparte por referencia.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::environment::EnvironmentConfig;
use crate::database::{Connector, DatabaseManager, PgConnector};
use crate::monitoring::PerformanceMonitor;

pub struct AppState<C: Connector = PgConnector> {
    pub config: Arc<EnvironmentConfig>,
    pub cache: CacheManager,
    pub database: DatabaseManager<C>,
    pub monitor: PerformanceMonitor,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cache: self.cache.clone(),
            database: self.database.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(
        config: EnvironmentConfig,
        cache: CacheManager,
        database: DatabaseManager<C>,
        monitor: PerformanceMonitor,
    ) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            database,
            monitor,
        }
    }
}
