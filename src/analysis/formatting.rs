//! Formatting utilities for analysis output
//!
//! Rates use base-10 networking units (1 Kbps = 1000 bits per second), the
//! same convention the measurement logs are written in.

/// Formats a rate in bits per second with an appropriate unit
///
/// # Examples
///
/// ```
/// use pair_intervals::analysis::formatting::format_bits_per_sec;
///
/// assert_eq!(format_bits_per_sec(0.0), "0.00 bps");
/// assert_eq!(format_bits_per_sec(64000.0), "64.00 Kbps");
/// assert_eq!(format_bits_per_sec(6250000.0), "6.25 Mbps");
/// assert_eq!(format_bits_per_sec(1.5e9), "1.50 Gbps");
/// ```
pub fn format_bits_per_sec(bits_per_sec: f64) -> String {
    if bits_per_sec < 1e3 {
        format!("{:.2} bps", bits_per_sec)
    } else if bits_per_sec < 1e6 {
        format!("{:.2} Kbps", bits_per_sec / 1e3)
    } else if bits_per_sec < 1e9 {
        format!("{:.2} Mbps", bits_per_sec / 1e6)
    } else {
        format!("{:.2} Gbps", bits_per_sec / 1e9)
    }
}

/// Formats a value already expressed in Mbps
pub fn format_mbps(mbps: f64) -> String {
    format_bits_per_sec(mbps * 1e6)
}

/// Formats an optional percentage, `-` when unavailable
pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(value) => format!("{:.2}%", value),
        None => "-".to_string(),
    }
}

/// Formats a `[start, stop)` window in seconds
pub fn format_window(start: f64, stop: f64) -> String {
    format!("{:>6.2}-{:<6.2}s", start, stop)
}
