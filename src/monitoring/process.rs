//! Uso de memoria y CPU del proceso
//!
//! Se lee con el `ProcessCollector` de prometheus (solo Linux). En otras
//! plataformas todos los valores son cero.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUsage {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
    pub cpu_seconds: f64,
    pub open_fds: u64,
    pub threads: u64,
}

#[cfg(target_os = "linux")]
pub fn process_usage() -> ProcessUsage {
    use prometheus::core::Collector;
    use prometheus::process_collector::ProcessCollector;

    let mut usage = ProcessUsage::default();
    for family in ProcessCollector::for_self().collect() {
        let Some(metric) = family.get_metric().first() else {
            continue;
        };
        match family.get_name() {
            "process_resident_memory_bytes" => {
                usage.resident_bytes = metric.get_gauge().get_value() as u64
            }
            "process_virtual_memory_bytes" => {
                usage.virtual_bytes = metric.get_gauge().get_value() as u64
            }
            "process_cpu_seconds_total" => usage.cpu_seconds = metric.get_counter().get_value(),
            "process_open_fds" => usage.open_fds = metric.get_gauge().get_value() as u64,
            "process_threads" => usage.threads = metric.get_gauge().get_value() as u64,
            _ => {}
        }
    }
    usage
}

#[cfg(not(target_os = "linux"))]
pub fn process_usage() -> ProcessUsage {
    ProcessUsage::default()
}
