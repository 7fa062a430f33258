//! End-of-build summary formatting.

use std::time::Duration;

/// `<minutes>m <seconds>s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Size in MiB with two decimals, e.g. `12.34 MB`
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
