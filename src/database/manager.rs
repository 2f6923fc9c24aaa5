//! Gestor de la conexión a la base de datos
//!
//! Dueño único de la conexión: conexión inicial con reintentos acotados,
//! reconexión automática en segundo plano y estado consultable.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::connection::{ConnectionTarget, Connector, DatabaseError, PgConnector, ServerStats};
use crate::config::database::{mask_database_url, DatabaseConfig};

/// Estado del ciclo de vida de la conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReadyState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
    Disconnecting = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReadyState::Connected,
            2 => ReadyState::Connecting,
            3 => ReadyState::Disconnecting,
            _ => ReadyState::Disconnected,
        }
    }
}

/// Eventos que mantienen sincronizado `is_connected`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Disconnected,
    Error(String),
    Reconnected,
}

/// Foto del estado de la conexión
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub ready_state: ReadyState,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub connection_attempts: u32,
    pub reconnect_attempts: u64,
}

/// Estadísticas del servidor, o el motivo por el que no hay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatabaseStats {
    Available(ServerStats),
    Unavailable { error: String },
}

struct ConnectionState<H> {
    handle: Option<H>,
    target: ConnectionTarget,
    uri: Option<String>,
}

struct Inner<C: Connector> {
    connector: C,
    config: DatabaseConfig,
    state: RwLock<ConnectionState<C::Handle>>,
    ready_state: AtomicU8,
    is_connected: AtomicBool,
    connection_attempts: AtomicU32,
    reconnect_attempts: AtomicU64,
    reconnecting: AtomicBool,
    shutting_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

/// Conexión única del proceso a la base de datos
pub struct DatabaseManager<C: Connector = PgConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for DatabaseManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl DatabaseManager<PgConnector> {
    /// Crear el gestor con el conector PostgreSQL
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_connector(PgConnector, config)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: Connector> DatabaseManager<C> {
    pub fn with_connector(connector: C, config: DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                state: RwLock::new(ConnectionState {
                    handle: None,
                    target: ConnectionTarget::default(),
                    uri: None,
                }),
                ready_state: AtomicU8::new(ReadyState::Disconnected as u8),
                is_connected: AtomicBool::new(false),
                connection_attempts: AtomicU32::new(0),
                reconnect_attempts: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                watchdog: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected.load(Ordering::SeqCst)
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.inner.ready_state.load(Ordering::SeqCst))
    }

    pub fn connection_attempts(&self) -> u32 {
        self.inner.connection_attempts.load(Ordering::SeqCst)
    }

    fn set_ready_state(&self, state: ReadyState) {
        self.inner.ready_state.store(state as u8, Ordering::SeqCst);
    }

    /// Handle de la conexión activa, si la hay
    pub async fn handle(&self) -> Option<C::Handle> {
        if !self.is_connected() {
            return None;
        }
        self.inner.state.read().await.handle.clone()
    }

    /// Conectar con reintentos acotados por `max_retries`
    ///
    /// Cada intento espera `retry_delay` tras un fallo. Al agotar los intentos
    /// devuelve `DatabaseError::RetriesExhausted`; `connect_or_exit` convierte
    /// ese error en la terminación del proceso.
    pub async fn connect(&self, uri: &str) -> Result<(), DatabaseError> {
        if self.is_connected() {
            debug!("Base de datos ya conectada, ignorando connect()");
            return Ok(());
        }

        let config = &self.inner.config;
        let max_retries = config.max_retries.max(1);
        let masked = mask_database_url(uri);

        self.inner.shutting_down.store(false, Ordering::SeqCst);
        self.inner.connection_attempts.store(0, Ordering::SeqCst);
        self.inner.state.write().await.uri = Some(uri.to_string());

        loop {
            let attempt = self.inner.connection_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.set_ready_state(ReadyState::Connecting);
            info!(
                "🔌 Conectando a la base de datos (intento {}/{}): {}",
                attempt, max_retries, masked
            );

            match self.inner.connector.open(uri, config).await {
                Ok((handle, target)) => {
                    info!(
                        "✅ Base de datos conectada: {}:{}/{}",
                        target.host, target.port, target.name
                    );
                    self.install(handle, target).await;
                    self.spawn_watchdog();
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "❌ Error conectando a la base de datos (intento {}/{}): {}",
                        attempt, max_retries, e
                    );
                    if attempt >= max_retries {
                        self.set_ready_state(ReadyState::Disconnected);
                        return Err(DatabaseError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!("🔄 Reintentando en {:?}...", config.retry_delay);
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    /// Conectar o terminar el proceso si la base nunca fue alcanzable
    pub async fn connect_or_exit(&self, uri: &str) {
        if let Err(e) = self.connect(uri).await {
            error!("💀 No se pudo conectar a la base de datos, abortando: {}", e);
            std::process::exit(1);
        }
    }

    async fn install(&self, handle: C::Handle, target: ConnectionTarget) {
        let previous = {
            let mut state = self.inner.state.write().await;
            state.target = target;
            state.handle.replace(handle)
        };
        if let Some(previous) = previous {
            self.inner.connector.close(previous).await;
        }

        self.inner.connection_attempts.store(0, Ordering::SeqCst);
        self.inner.is_connected.store(true, Ordering::SeqCst);
        self.set_ready_state(ReadyState::Connected);
    }

    /// Procesar un evento de la conexión
    pub fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Disconnected => {
                if self.inner.is_connected.swap(false, Ordering::SeqCst) {
                    warn!("⚠️ Base de datos desconectada");
                }
                self.set_ready_state(ReadyState::Disconnected);
                if !self.inner.shutting_down.load(Ordering::SeqCst) {
                    self.spawn_reconnection();
                }
            }
            ConnectionEvent::Error(message) => {
                error!("❌ Error de base de datos: {}", message);
            }
            ConnectionEvent::Reconnected => {
                self.inner.is_connected.store(true, Ordering::SeqCst);
                self.inner.connection_attempts.store(0, Ordering::SeqCst);
                self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
                self.set_ready_state(ReadyState::Connected);
                info!("✅ Base de datos reconectada");
            }
        }
    }

    fn spawn_reconnection(&self) {
        let this = self.clone();
        let task = tokio::spawn(async move { this.handle_reconnection().await });

        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Reintentar la conexión en segundo plano hasta recuperarla
    ///
    /// Sin límite de intentos: la base ya fue alcanzable una vez. Solo una
    /// reconexión corre a la vez; las llamadas concurrentes vuelven enseguida.
    pub async fn handle_reconnection(&self) {
        if self
            .inner
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconexión ya en curso");
            return;
        }

        let uri = self.inner.state.read().await.uri.clone();
        if let Some(uri) = uri {
            self.reconnect_loop(&uri).await;
        }

        self.inner.reconnecting.store(false, Ordering::SeqCst);
    }

    async fn reconnect_loop(&self, uri: &str) {
        let config = &self.inner.config;
        loop {
            if self.should_stop_reconnecting() {
                return;
            }
            tokio::time::sleep(config.retry_delay).await;
            if self.should_stop_reconnecting() {
                return;
            }

            let attempt = self.inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.set_ready_state(ReadyState::Connecting);
            info!("🔄 Intento de reconexión #{}", attempt);

            match self.inner.connector.open(uri, config).await {
                Ok((handle, target)) => {
                    self.install(handle, target).await;
                    self.handle_event(ConnectionEvent::Reconnected);
                    return;
                }
                Err(e) => {
                    self.set_ready_state(ReadyState::Disconnected);
                    warn!("⚠️ Reconexión #{} fallida: {}", attempt, e);
                }
            }
        }
    }

    fn should_stop_reconnecting(&self) -> bool {
        self.is_connected() || self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Chequeo periódico que detecta conexiones caídas
    fn spawn_watchdog(&self) {
        let mut watchdog = lock(&self.inner.watchdog);
        if watchdog.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let this = self.clone();
        let period = self.inner.config.health_check_interval;
        *watchdog = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if this.inner.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                if !this.is_connected() {
                    continue;
                }
                let Some(handle) = this.inner.state.read().await.handle.clone() else {
                    continue;
                };
                if let Err(e) = this.inner.connector.ping(&handle).await {
                    this.handle_event(ConnectionEvent::Error(e.to_string()));
                    this.handle_event(ConnectionEvent::Disconnected);
                }
            }
        }));
    }

    /// Cerrar la conexión; llamadas repetidas no tienen efecto
    pub async fn disconnect(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);

        if let Some(watchdog) = lock(&self.inner.watchdog).take() {
            watchdog.abort();
        }
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        self.inner.reconnecting.store(false, Ordering::SeqCst);

        let handle = self.inner.state.write().await.handle.take();
        match handle {
            Some(handle) => {
                self.set_ready_state(ReadyState::Disconnecting);
                self.inner.connector.close(handle).await;
                self.inner.is_connected.store(false, Ordering::SeqCst);
                self.set_ready_state(ReadyState::Disconnected);
                info!("👋 Conexión a la base de datos cerrada");
            }
            None => {
                self.inner.is_connected.store(false, Ordering::SeqCst);
                self.set_ready_state(ReadyState::Disconnected);
                debug!("Base de datos ya desconectada");
            }
        }
    }

    pub async fn get_connection_status(&self) -> ConnectionStatus {
        let state = self.inner.state.read().await;
        ConnectionStatus {
            is_connected: self.is_connected(),
            ready_state: self.ready_state(),
            host: state.target.host.clone(),
            port: state.target.port,
            name: state.target.name.clone(),
            connection_attempts: self.connection_attempts(),
            reconnect_attempts: self.inner.reconnect_attempts.load(Ordering::SeqCst),
        }
    }

    /// Estadísticas del servidor; nunca falla, devuelve el error como dato
    pub async fn get_stats(&self) -> DatabaseStats {
        let Some(handle) = self.handle().await else {
            return DatabaseStats::Unavailable {
                error: DatabaseError::NotConnected.to_string(),
            };
        };

        match self.inner.connector.server_stats(&handle).await {
            Ok(stats) => DatabaseStats::Available(stats),
            Err(e) => {
                warn!("⚠️ Error obteniendo estadísticas de la base de datos: {}", e);
                DatabaseStats::Unavailable {
                    error: e.to_string(),
                }
            }
        }
    }
}
