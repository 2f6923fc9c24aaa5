//! Formato legible de bytes y tiempos

/// `1536` -> `"1.50 KB"`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Milisegundos de uptime como `"1d 2h 3m"`
pub fn format_uptime(ms: u64) -> String {
    let total_minutes = ms / 60_000;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

/// Redondeo a dos decimales
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
