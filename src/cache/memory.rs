//! Cache en memoria
//!
//! Respaldo del cache cuando Redis no está configurado o no responde.
//! Cada clave tiene su propio temporizador de expiración; el temporizador
//! se cancela al sobrescribir, borrar o vaciar la clave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::backend::{BackendKind, CacheBackend, CacheSize};
use super::error::CacheError;

struct MemoryEntry {
    value: Value,
    expires_at: Instant,
    generation: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    timers: HashMap<String, JoinHandle<()>>,
    generation: u64,
}

impl MemoryState {
    fn live(&self, key: &str, now: Instant) -> Option<&MemoryEntry> {
        self.entries.get(key).filter(|entry| entry.expires_at > now)
    }

    fn remove(&mut self, key: &str) -> bool {
        if let Some(timer) = self.timers.remove(key) {
            timer.abort();
        }
        self.entries.remove(key).is_some()
    }

    fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        self.entries.clear();
    }
}

/// Cache en memoria del proceso
pub struct MemoryCache {
    state: Arc<Mutex<MemoryState>>,
    connected: AtomicBool,
}

impl MemoryCache {
    /// Crear un cache en memoria; siempre está disponible
    pub fn new() -> Self {
        info!("🧠 Cache en memoria inicializado");
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            connected: AtomicBool::new(true),
        }
    }

    fn ensure_connected(&self) -> Result<(), CacheError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Disconnected)
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_expiry(
    state: Weak<Mutex<MemoryState>>,
    key: String,
    generation: u64,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock().await;
        let current = state
            .entries
            .get(&key)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            state.entries.remove(&key);
            state.timers.remove(&key);
            debug!("⏰ Clave expirada en memoria: {}", key);
        }
    })
}

/// Convierte un patrón glob de Redis en una expresión regular anclada.
///
/// Soporta `*`, `?`, clases `[abc]`, `[^a]`, `[a-z]` y escapes con `\`.
/// Un `[` sin cerrar o sin contenido se toma como literal.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut expr, chars[i]);
            }
            '[' => match class_end(&chars, i + 1) {
                Some(end) => {
                    push_class(&mut expr, &chars[i + 1..end]);
                    i = end;
                }
                None => push_literal(&mut expr, '['),
            },
            other => push_literal(&mut expr, other),
        }
        i += 1;
    }

    expr.push('$');
    Regex::new(&expr)
}

fn push_literal(expr: &mut String, c: char) {
    expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
}

/// Índice del `]` que cierra la clase abierta antes de `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let first = if chars.get(start) == Some(&'^') { start + 1 } else { start };
    let mut i = first;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' if i > first => return Some(i),
            ']' => return None,
            _ => i += 1,
        }
    }
    None
}

fn push_class(expr: &mut String, body: &[char]) {
    expr.push('[');
    let body = match body.split_first() {
        Some(('^', rest)) => {
            expr.push('^');
            rest
        }
        _ => body,
    };

    let mut j = 0;
    while j < body.len() {
        let mut c = body[j];
        if c == '\\' && j + 1 < body.len() {
            j += 1;
            c = body[j];
        } else if j + 2 < body.len() && body[j + 1] == '-' {
            // Redis acepta rangos invertidos
            let (low, high) = if c <= body[j + 2] { (c, body[j + 2]) } else { (body[j + 2], c) };
            push_literal(expr, low);
            expr.push('-');
            push_literal(expr, high);
            j += 3;
            continue;
        }
        push_literal(expr, c);
        j += 1;
    }
    expr.push(']');
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        Ok(state.live(key, Instant::now()).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_connected()?;
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;

        let mut state = self.state.lock().await;
        state.generation += 1;
        let generation = state.generation;

        state.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at,
                generation,
            },
        );

        let timer = schedule_expiry(Arc::downgrade(&self.state), key.to_string(), generation, ttl);
        if let Some(previous) = state.timers.insert(key.to_string(), timer) {
            previous.abort();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_connected()?;
        Ok(self.state.lock().await.remove(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        Ok(state.live(key, Instant::now()).is_some())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| state.live(key, now).map(|entry| entry.value.clone()))
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        let now = Instant::now();
        Ok(state.live(key, now).map(|entry| entry.expires_at - now))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.ensure_connected()?;
        let regex = glob_to_regex(pattern)?;
        let mut state = self.state.lock().await;
        let matching: Vec<String> = state
            .entries
            .keys()
            .filter(|key| regex.is_match(key))
            .cloned()
            .collect();
        for key in &matching {
            state.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.ensure_connected()?;
        self.state.lock().await.clear();
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.state.lock().await.clear();
            info!("🧠 Cache en memoria cerrado");
        }
    }

    async fn size(&self) -> CacheSize {
        let state = self.state.lock().await;
        let now = Instant::now();
        CacheSize::Exact(state.entries.values().filter(|e| e.expires_at > now).count())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
