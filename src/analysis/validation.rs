//! Consistency checks for extracted measurements
//!
//! Interval-length checks for bandwidth reports, counter reset detection for
//! cumulative counters, and boundary comparison for window alignment.

use log::trace;

/// Tolerance used when comparing a report's window length to the sampling interval
pub const DURATION_TOLERANCE: f64 = 1e-6;

/// Returns true when `[start, stop)` has the expected sampling length
pub fn is_expected_duration(start: f64, stop: f64, expected: f64) -> bool {
    ((stop - start) - expected).abs() <= DURATION_TOLERANCE
}

/// Returns true when `[start, stop)` covers the whole declared test duration
///
/// iperf reports its whole-run average on a window starting at zero and ending
/// at (or slightly after) the requested test time.
pub fn is_summary_window(start: f64, stop: f64, test_duration: f64) -> bool {
    start == 0.0 && stop >= test_duration - DURATION_TOLERANCE
}

/// Elapsed time between two samples, `None` when it is not strictly positive
pub fn positive_duration(start: f64, stop: f64) -> Option<f64> {
    let elapsed = stop - start;
    if elapsed > 0.0 { Some(elapsed) } else { None }
}

/// Detects a reset of a cumulative counter (current reading below the previous one)
pub fn detect_counter_reset(current: u64, previous: u64) -> bool {
    current < previous
}

/// Difference between two readings of a cumulative counter
///
/// Returns `None` when the counter went backwards, which happens on interface
/// restarts and counter wraparound.
pub fn counter_delta(current: u64, previous: u64) -> Option<u64> {
    if detect_counter_reset(current, previous) {
        trace!(
            "Counter reset detected: {} -> {}",
            previous, current
        );
        return None;
    }
    Some(current - previous)
}

/// Returns true when two window boundaries are the same within `tolerance`
pub fn same_boundary(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Rounds to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
