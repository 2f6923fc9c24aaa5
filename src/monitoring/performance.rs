//! Monitor de rendimiento
//!
//! Agrega tiempos de respuesta y códigos de estado por endpoint. Solo
//! observa: nunca bloquea ni modifica las respuestas.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::format::{format_bytes, format_uptime, round2};
use super::process::{process_usage, ProcessUsage};

/// Etiqueta `route` compartida por todas las requests sin ruta registrada
pub const UNMATCHED_ROUTE_LABEL: &str = "unmatched";

/// Ruta de una request: plantilla del router o ruta cruda si no hubo match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRoute<'a> {
    Matched(&'a str),
    Unmatched(&'a str),
}

impl<'a> RequestRoute<'a> {
    /// Ruta usada en el mapa de endpoints
    pub fn path(&self) -> &'a str {
        match self {
            RequestRoute::Matched(path) | RequestRoute::Unmatched(path) => path,
        }
    }

    /// Etiqueta para Prometheus; las rutas sin match no crean series nuevas
    pub fn label(&self) -> &'a str {
        match self {
            RequestRoute::Matched(path) => path,
            RequestRoute::Unmatched(_) => UNMATCHED_ROUTE_LABEL,
        }
    }
}

/// Configuración del monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub slow_request_threshold_ms: u64,
    pub memory_threshold_bytes: u64,
    /// Cantidad de endpoints incluidos en la foto de métricas
    pub top_endpoints: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold_ms: 1000,
            memory_threshold_bytes: 500 * 1024 * 1024,
            top_endpoints: 10,
        }
    }
}

const ERROR_RATE_WARNING: f64 = 5.0;
const AVERAGE_RESPONSE_WARNING_MS: f64 = 500.0;
const SLOW_REQUEST_RATIO_WARNING: f64 = 10.0;

/// Acumulados de un endpoint (método + ruta)
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointStats {
    pub requests: u64,
    pub total_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub errors: u64,
}

impl EndpointStats {
    fn first(response_time: f64) -> Self {
        Self {
            requests: 0,
            total_time: 0.0,
            min_time: response_time,
            max_time: response_time,
            errors: 0,
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_time / self.requests as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        percentage(self.errors, self.requests)
    }
}

struct MonitorState {
    requests: u64,
    errors: u64,
    total_response_time: f64,
    slow_requests: u64,
    started: Instant,
    started_at: DateTime<Utc>,
    endpoints: HashMap<String, EndpointStats>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            requests: 0,
            errors: 0,
            total_response_time: 0.0,
            slow_requests: 0,
            started: Instant::now(),
            started_at: Utc::now(),
            endpoints: HashMap::new(),
        }
    }

    fn average_response_time(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_response_time / self.requests as f64
        }
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeInfo {
    pub ms: u64,
    pub formatted: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub per_second: f64,
    pub slow: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeSummary {
    pub average: f64,
    pub slow_threshold: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub endpoint: String,
    pub requests: u64,
    pub average_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub errors: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySummary {
    pub resident: String,
    pub virtual_memory: String,
    pub resident_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSummary {
    pub total_seconds: f64,
    pub threads: u64,
    pub open_fds: u64,
}

/// Foto de las métricas en un instante
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime: UptimeInfo,
    pub requests: RequestSummary,
    pub response_time: ResponseTimeSummary,
    pub endpoints: Vec<EndpointSummary>,
    pub memory: MemorySummary,
    pub cpu: CpuSummary,
    pub timestamp: DateTime<Utc>,
}

struct HttpCollectors {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl HttpCollectors {
    fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total de requests HTTP"),
            &["method", "route", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "Duración de las requests HTTP"),
            &["method", "route"],
        )?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }
}

/// Agregador de métricas de requests del proceso
#[derive(Clone)]
pub struct PerformanceMonitor {
    state: Arc<RwLock<MonitorState>>,
    config: MonitorConfig,
    collectors: Arc<HttpCollectors>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self, prometheus::Error> {
        Ok(Self {
            state: Arc::new(RwLock::new(MonitorState::new())),
            config,
            collectors: Arc::new(HttpCollectors::new()?),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Registrar una request HTTP terminada
    pub async fn record_request(
        &self,
        method: &str,
        route: RequestRoute<'_>,
        elapsed: Duration,
        status: u16,
    ) {
        let endpoint = format!("{} {}", method, route.path());
        self.update_metrics(&endpoint, elapsed.as_secs_f64() * 1000.0, status)
            .await;

        let label = route.label();
        self.collectors
            .requests
            .with_label_values(&[method, label, &status.to_string()])
            .inc();
        self.collectors
            .duration
            .with_label_values(&[method, label])
            .observe(elapsed.as_secs_f64());
    }

    /// Acumular una observación (tiempo en milisegundos)
    pub async fn update_metrics(&self, endpoint: &str, response_time: f64, status_code: u16) {
        let is_error = status_code >= 400;
        let mut state = self.state.write().await;

        state.requests += 1;
        state.total_response_time += response_time;
        if is_error {
            state.errors += 1;
        }

        let stats = state
            .endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| EndpointStats::first(response_time));
        stats.requests += 1;
        stats.total_time += response_time;
        stats.min_time = stats.min_time.min(response_time);
        stats.max_time = stats.max_time.max(response_time);
        if is_error {
            stats.errors += 1;
        }

        if response_time > self.config.slow_request_threshold_ms as f64 {
            state.slow_requests += 1;
            warn!(
                "🐌 Request lenta: {} tardó {:.2}ms (status {})",
                endpoint, response_time, status_code
            );
        } else {
            debug!("⏱️ {} {:.2}ms (status {})", endpoint, response_time, status_code);
        }
    }

    pub async fn endpoint_stats(&self, endpoint: &str) -> Option<EndpointStats> {
        self.state.read().await.endpoints.get(endpoint).cloned()
    }

    /// Foto de las métricas actuales; no modifica el estado
    pub async fn get_metrics(&self) -> MetricsSnapshot {
        let state = self.state.read().await;
        let uptime_ms = state.started.elapsed().as_millis() as u64;
        let uptime_secs = uptime_ms as f64 / 1000.0;

        let per_second = if uptime_secs > 0.0 {
            round2(state.requests as f64 / uptime_secs)
        } else {
            0.0
        };

        let mut endpoints: Vec<EndpointSummary> = state
            .endpoints
            .iter()
            .map(|(endpoint, stats)| EndpointSummary {
                endpoint: endpoint.clone(),
                requests: stats.requests,
                average_time: round2(stats.average_time()),
                min_time: round2(stats.min_time),
                max_time: round2(stats.max_time),
                errors: stats.errors,
                error_rate: stats.error_rate(),
            })
            .collect();
        endpoints.sort_by(|a, b| {
            b.requests
                .cmp(&a.requests)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        endpoints.truncate(self.config.top_endpoints);

        let usage = process_usage();

        MetricsSnapshot {
            uptime: UptimeInfo {
                ms: uptime_ms,
                formatted: format_uptime(uptime_ms),
                started_at: state.started_at,
            },
            requests: RequestSummary {
                total: state.requests,
                errors: state.errors,
                error_rate: percentage(state.errors, state.requests),
                per_second,
                slow: state.slow_requests,
            },
            response_time: ResponseTimeSummary {
                average: round2(state.average_response_time()),
                slow_threshold: self.config.slow_request_threshold_ms,
            },
            endpoints,
            memory: memory_summary(&usage),
            cpu: CpuSummary {
                total_seconds: usage.cpu_seconds,
                threads: usage.threads,
                open_fds: usage.open_fds,
            },
            timestamp: Utc::now(),
        }
    }

    /// Compara la memoria residente con el umbral configurado
    pub fn check_memory_leaks(&self) -> bool {
        self.memory_exceeds_threshold(&process_usage())
    }

    fn memory_exceeds_threshold(&self, usage: &ProcessUsage) -> bool {
        if usage.resident_bytes > self.config.memory_threshold_bytes {
            warn!(
                "🚨 Uso de memoria alto: {} (umbral {})",
                format_bytes(usage.resident_bytes),
                format_bytes(self.config.memory_threshold_bytes)
            );
            true
        } else {
            false
        }
    }

    /// Sugerencias de optimización derivadas de las métricas
    pub async fn get_optimization_suggestions(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut suggestions = Vec::new();

        let error_rate = percentage(state.errors, state.requests);
        if error_rate > ERROR_RATE_WARNING {
            suggestions.push(format!(
                "Tasa de errores alta ({:.2}%): revisar el manejo de errores y la validación de entradas",
                error_rate
            ));
        }

        let average = state.average_response_time();
        if average > AVERAGE_RESPONSE_WARNING_MS {
            suggestions.push(format!(
                "Tiempo medio de respuesta elevado ({:.2}ms): cachear lecturas frecuentes o revisar índices",
                average
            ));
        }

        let slow_ratio = percentage(state.slow_requests, state.requests);
        if slow_ratio > SLOW_REQUEST_RATIO_WARNING {
            suggestions.push(format!(
                "{:.2}% de las requests superan {}ms: revisar consultas costosas",
                slow_ratio, self.config.slow_request_threshold_ms
            ));
        }

        let threshold = self.config.slow_request_threshold_ms as f64;
        let mut slow_endpoints: Vec<(&String, f64)> = state
            .endpoints
            .iter()
            .map(|(endpoint, stats)| (endpoint, stats.average_time()))
            .filter(|(_, average)| *average > threshold)
            .collect();
        if !slow_endpoints.is_empty() {
            slow_endpoints.sort_by(|a, b| b.1.total_cmp(&a.1));
            let listed: Vec<String> = slow_endpoints
                .iter()
                .map(|(endpoint, average)| format!("{} ({:.2}ms)", endpoint, average))
                .collect();
            suggestions.push(format!("Endpoints lentos: {}", listed.join(", ")));
        }

        suggestions
    }

    /// Reinicia contadores, endpoints y el reloj de uptime
    ///
    /// Los contadores de Prometheus no se tocan: deben ser monótonos.
    pub async fn reset(&self) {
        *self.state.write().await = MonitorState::new();
        debug!("🔄 Métricas de rendimiento reiniciadas");
    }

    /// Métricas en formato de exposición de Prometheus
    pub fn render_prometheus(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.collectors.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn memory_summary(usage: &ProcessUsage) -> MemorySummary {
    MemorySummary {
        resident: format_bytes(usage.resident_bytes),
        virtual_memory: format_bytes(usage.virtual_bytes),
        resident_bytes: usage.resident_bytes,
    }
}
