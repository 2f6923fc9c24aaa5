//! Monitoreo
//!
//! Métricas de rendimiento de las requests HTTP y uso de recursos del proceso.

pub mod format;
pub mod performance;
pub mod process;

pub use performance::{
    EndpointStats, MetricsSnapshot, MonitorConfig, PerformanceMonitor, RequestRoute,
    UNMATCHED_ROUTE_LABEL,
};
pub use process::{process_usage, ProcessUsage};
