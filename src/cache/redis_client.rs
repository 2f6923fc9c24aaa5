use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{BackendKind, CacheBackend, CacheSize};
use super::cache_config::{CacheConfig, RetryDecision};
use super::error::CacheError;
use crate::config::database::mask_database_url;

/// Cliente Redis con reconexión automática y operaciones async
pub struct RedisClient {
    manager: ConnectionManager,
    connected: Arc<AtomicBool>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl RedisClient {
    /// Conectar a Redis aplicando la política de reintentos de la configuración
    pub async fn connect(config: &CacheConfig, redis_url: &str) -> Result<Self, CacheError> {
        let masked = mask_database_url(redis_url);
        info!("🔗 Conectando a Redis: {}", masked);

        let client = redis::Client::open(redis_url)?;
        let started = Instant::now();
        let mut attempt = 0;

        let manager = loop {
            attempt += 1;
            // Un solo intento por vuelta; los reintentos los decide la política
            match ConnectionManager::new_with_backoff(client.clone(), 2, 100, 0).await {
                Ok(manager) => break manager,
                Err(e) => {
                    let refused = e.is_connection_refusal();
                    if refused {
                        error!("❌ Redis rechazó la conexión en {}", masked);
                    }
                    match config.retry.decide(attempt, started.elapsed(), refused) {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                "⚠️ Intento {} de conexión a Redis fallido: {} (reintento en {:?})",
                                attempt, e, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::GiveUp(reason) => {
                            warn!("⚠️ Abandonando conexión a Redis ({}): {}", reason, e);
                            return Err(e.into());
                        }
                    }
                }
            }
        };

        // Test de conexión usando un comando simple
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");

        let connected = Arc::new(AtomicBool::new(true));
        let heartbeat = spawn_heartbeat(manager.clone(), connected.clone(), config.heartbeat_interval);

        Ok(Self {
            manager,
            connected,
            heartbeat: Mutex::new(Some(heartbeat)),
        })
    }

    fn connection(&self) -> Result<ConnectionManager, CacheError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(self.manager.clone())
        } else {
            Err(CacheError::Disconnected)
        }
    }

    /// Marca el cliente como desconectado si el error es de conectividad
    fn track<T>(&self, result: RedisResult<T>) -> Result<T, CacheError> {
        result.map_err(|e| {
            let err = CacheError::from(e);
            if err.is_connection_error() && self.connected.swap(false, Ordering::SeqCst) {
                warn!("⚠️ Redis desconectado: {}", err);
            }
            err
        })
    }
}

/// PING periódico que mantiene sincronizado el estado de conexión
fn spawn_heartbeat(
    manager: ConnectionManager,
    connected: Arc<AtomicBool>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut conn = manager;
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let alive = redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .is_ok();
            let was_alive = connected.swap(alive, Ordering::SeqCst);
            if was_alive && !alive {
                warn!("⚠️ Redis no responde al PING, marcando como desconectado");
            } else if !was_alive && alive {
                info!("✅ Redis reconectado");
            }
        }
    })
}

#[async_trait]
impl CacheBackend for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.connection()?;
        match self.track(conn.get::<_, Option<String>>(key).await)? {
            Some(raw) => {
                debug!("📥 Cache HIT para clave: {}", key);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => {
                debug!("❌ Cache MISS para clave: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let serialized = serde_json::to_string(&value)?;
        let seconds = ttl.as_secs().max(1);
        self.track(conn.set_ex::<_, _, ()>(key, serialized, seconds).await)?;
        debug!("💾 Cache SET para clave: {} (TTL: {}s)", key, seconds);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let count: i64 = self.track(conn.del(key).await)?;
        debug!("🗑️ Cache DELETE para clave: {} (eliminados: {})", key, count);
        Ok(count > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        self.track(conn.exists(key).await)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        let raw: Vec<Option<String>> = self.track(conn.mget(keys).await)?;

        // Un valor corrupto cuenta como ausente sin arrastrar al resto
        Ok(raw
            .into_iter()
            .map(|value| {
                value.and_then(|raw| match serde_json::from_str(&raw) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("⚠️ Valor de cache ilegible: {}", e);
                        None
                    }
                })
            })
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.connection()?;
        let ttl: i64 = self.track(conn.ttl(key).await)?;
        Ok((ttl > 0).then(|| Duration::from_secs(ttl as u64)))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection()?;
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = self.track(
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await,
            )?;
            if !batch.is_empty() {
                let count: u64 = self.track(conn.del(batch).await)?;
                removed += count;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("🗑️ Cache DELETE por patrón {} (eliminados: {})", pattern, removed);
        Ok(removed)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        info!("🧹 Limpiando cache completo...");
        self.track(redis::cmd("FLUSHALL").query_async::<_, ()>(&mut conn).await)?;
        info!("✅ Cache limpiado completamente");
        Ok(())
    }

    async fn disconnect(&self) {
        let heartbeat = match self.heartbeat.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = heartbeat {
            handle.abort();
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            let mut conn = self.manager.clone();
            if let Err(e) = redis::cmd("QUIT").query_async::<_, ()>(&mut conn).await {
                debug!("QUIT de Redis sin respuesta: {}", e);
            }
            info!("👋 Cliente Redis desconectado");
        }
    }

    async fn size(&self) -> CacheSize {
        CacheSize::Unknown
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }
}
