//! Bandwidth unit normalization
//!
//! Networking units are base 10: `Kbits` is 1e3 bits, not 1024.

use super::errors::{AnalysisError, Result};

/// Multiplier for a unit string, chosen by its first character only
///
/// `k`, `m` and `g` (any case) map to 1e3, 1e6 and 1e9. Anything else,
/// including a bare `bits/sec` or an empty string, scales by 1.0.
pub fn unit_factor(unit: &str) -> f64 {
    match unit.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('k') => 1e3,
        Some('m') => 1e6,
        Some('g') => 1e9,
        _ => 1.0,
    }
}

/// Converts `magnitude` expressed in `unit` to its unscaled value
///
/// # Examples
///
/// ```
/// use pair_intervals::analysis::units::scale;
///
/// assert_eq!(scale("1.5", "Mbits/sec").unwrap(), 1.5e6);
/// assert_eq!(scale("3", "bits/sec").unwrap(), 3.0);
/// ```
pub fn scale(magnitude: &str, unit: &str) -> Result<f64> {
    let value: f64 = magnitude
        .trim()
        .parse()
        .map_err(|_| AnalysisError::MalformedUnit {
            token: magnitude.to_string(),
        })?;
    Ok(value * unit_factor(unit))
}

/// Converts a token such as `"12.3 Mbits/sec"` to bits per second
pub fn to_bits_per_sec(token: &str) -> Result<f64> {
    let mut parts = token.split_whitespace();
    let magnitude = parts.next().unwrap_or("");
    let unit = parts.next().unwrap_or("");
    scale(magnitude, unit).map_err(|_| AnalysisError::MalformedUnit {
        token: token.to_string(),
    })
}
