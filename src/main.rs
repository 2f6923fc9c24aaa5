use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blood_bank_backend::api;
use blood_bank_backend::cache::CacheManager;
use blood_bank_backend::config::EnvironmentConfig;
use blood_bank_backend::database::DatabaseManager;
use blood_bank_backend::monitoring::PerformanceMonitor;
use blood_bank_backend::state::AppState;

const MEMORY_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🩸 Blood Bank Backend");
    info!("=====================");

    let config = EnvironmentConfig::from_env().context("Configuración inválida")?;

    // Inicializar base de datos (aborta el proceso si nunca conecta)
    let database = DatabaseManager::new(config.database.clone());
    database.connect_or_exit(&config.database.url).await;

    // Inicializar cache (Redis o memoria)
    let cache = CacheManager::init(&config.cache).await;
    info!("✅ Cache listo: {}", cache.kind());

    let monitor = PerformanceMonitor::new(config.monitor.clone())
        .context("No se pudo crear el monitor de rendimiento")?;

    let memory_check = {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MEMORY_CHECK_INTERVAL);
            loop {
                interval.tick().await;
                monitor.check_memory_leaks();
            }
        })
    };

    let server_url = config.server_url();
    let state = AppState::new(config, cache.clone(), database.clone(), monitor);
    let app = api::create_app(state);

    info!("🌐 Servidor iniciando en http://{}", server_url);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /api/health - Estado de base de datos y cache");
    info!("   GET    /api/metrics - Métricas de rendimiento");
    info!("   GET    /api/metrics/prometheus - Métricas en formato Prometheus");
    info!("   POST   /api/metrics/reset - Reiniciar métricas");
    info!("   GET    /api/cache/stats - Estadísticas del cache");
    info!("   DELETE /api/cache - Vaciar cache");
    info!("   DELETE /api/cache/pattern?pattern=... - Invalidar claves por patrón");
    info!("   GET    /api/database/status - Estado de la conexión");
    info!("   GET    /api/database/stats - Estadísticas del servidor (cacheadas)");

    let listener = tokio::net::TcpListener::bind(&server_url)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", server_url))?;

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    memory_check.abort();
    futures::future::join(cache.disconnect(), database.disconnect()).await;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
