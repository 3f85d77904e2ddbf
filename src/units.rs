//! Compact size notation for the progress line: 10M, 12.5K, and so forth.
//! humansize is used for log messages, but its unit labels (KiB, MiB) don't
//! match the single-letter form printed here.

use std::time::Duration;

const UNITS: [(u64, &str); 6] = [
    (1 << 60, "E"),
    (1 << 50, "P"),
    (1 << 40, "T"),
    (1 << 30, "G"),
    (1 << 20, "M"),
    (1 << 10, "K"),
];

/// Format a byte count using the largest binary unit that keeps the number
/// at or above 1, with one decimal place and a trailing `.0` trimmed.
pub fn byte_size(bytes: u64) -> String {
    for (scale, unit) in UNITS {
        if bytes >= scale {
            let value = format!("{:.1}", bytes as f64 / scale as f64);
            let value = value.strip_suffix(".0").unwrap_or(&value);
            return format!("{}{}", value, unit);
        }
    }
    format!("{}B", bytes)
}

/// Throughput in the same notation, e.g. `10M/s`.
///
/// A zero elapsed time (several flushes inside one clock tick) has no
/// meaningful rate and is rendered as `∞/s`.
pub fn human_speed(written: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "∞/s".to_string();
    }
    format!("{}/s", byte_size((written as f64 / secs) as u64))
}
