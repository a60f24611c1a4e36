//! Line classification for captured measurement logs
//!
//! Every log line is classified exactly once into a closed set of
//! [`LineKind`] variants. Lines that carry nothing of interest come back as
//! [`LineKind::Unmatched`], which is the normal case for most of a log and not
//! an error. A line that matches a pattern but carries a token that cannot be
//! parsed is an error.
//!
//! Recognized shapes:
//!
//! - bandwidth report: `[  3]  2.0- 2.5 sec   400 KBytes  6.55 Mbits/sec`
//! - timestamp marker: `1349986321.52 seconds`
//! - interface counters (`/proc/net/dev` layout): `h1-eth0: 1234 12 0 0 0 0 0 0 5678 ...`
//! - CPU counters (aggregate `/proc/stat` line): `cpu  4705 356 584 3699 23 23 0 0 0 0`

use log::trace;
use regex::Regex;
use std::sync::LazyLock;

use super::errors::{AnalysisError, Result};
use super::units;

static BANDWIDTH_REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*\d+\]\s+([\d.]+)\s*-\s*([\d.]+)\s+sec.*\s([\d.]+) ([KMGkmg]?bits/sec)")
        .expect("bandwidth report pattern is valid")
});

static TIMESTAMP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d+) seconds").expect("timestamp marker pattern is valid")
});

/// Column of the transmit byte counter, counted after the interface name
const TX_BYTES_COLUMN: usize = 8;

/// Accepted field counts on the aggregate CPU line (without and with guest_nice)
const CPU_FIELDS: [usize; 2] = [9, 10];

/// Default substring identifying interface counter lines
pub const DEFAULT_INTERFACE_MARKER: &str = "-eth";

/// A bandwidth report window and its rate in bits per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthReport {
    pub start: f64,
    pub stop: f64,
    pub bits_per_sec: f64,
}

/// Classification of one log line
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    BandwidthReport(BandwidthReport),
    /// Absolute seconds value establishing the timestamp of following counter lines
    TimestampMarker(f64),
    InterfaceCounters {
        interface: String,
        rx_bytes: u64,
        tx_bytes: u64,
    },
    CpuCounters(Vec<u64>),
    Unmatched,
}

/// Classifies log lines; the interface marker is the only tunable
///
/// Counter logs go through [`LineClassifier::classify`], which knows every
/// shape. Bandwidth logs go through [`LineClassifier::classify_bandwidth`].
#[derive(Debug, Clone)]
pub struct LineClassifier {
    interface_marker: String,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE_MARKER)
    }
}

impl LineClassifier {
    pub fn new(interface_marker: impl Into<String>) -> Self {
        Self {
            interface_marker: interface_marker.into(),
        }
    }

    pub fn interface_marker(&self) -> &str {
        &self.interface_marker
    }

    /// Classifies a single line
    pub fn classify(&self, line: &str) -> Result<LineKind> {
        if let Some(caps) = TIMESTAMP_MARKER.captures(line) {
            let seconds = parse_float(&caps[1], "timestamp")?;
            trace!("Timestamp marker: {}", seconds);
            return Ok(LineKind::TimestampMarker(seconds));
        }

        if !self.interface_marker.is_empty() && line.contains(&self.interface_marker) {
            return parse_interface_line(line);
        }

        if line.trim_start().starts_with("cpu ") {
            return parse_cpu_line(line);
        }

        Ok(match self.classify_bandwidth(line)? {
            Some(report) => LineKind::BandwidthReport(report),
            None => LineKind::Unmatched,
        })
    }

    /// Matches `line` against the bandwidth report shape only
    ///
    /// Bandwidth logs never carry counters, so a line that merely mentions an
    /// interface (`Binding to local address ... iface h1-eth0`) is not a
    /// report here rather than a malformed counter line.
    ///
    /// # Arguments
    /// * `line` - One line of a bandwidth log
    ///
    /// # Returns
    /// * `Ok(Some(report))` - The line is an interval or summary report
    /// * `Ok(None)` - Any other line
    /// * `Err(_)` - The line has the report shape but an unreadable number or unit
    ///
    /// # Examples
    /// ```
    /// use pair_intervals::analysis::lines::LineClassifier;
    ///
    /// let classifier = LineClassifier::default();
    /// let report = classifier
    ///     .classify_bandwidth("[  3]  0.0- 0.5 sec   400 KBytes  6.55 Mbits/sec")
    ///     .unwrap()
    ///     .unwrap();
    /// assert!((report.bits_per_sec - 6.55e6).abs() < 1e-3);
    /// assert!(classifier.classify_bandwidth("iface h1-eth0").unwrap().is_none());
    /// ```
    pub fn classify_bandwidth(&self, line: &str) -> Result<Option<BandwidthReport>> {
        let Some(caps) = BANDWIDTH_REPORT.captures(line) else {
            return Ok(None);
        };
        let start = parse_float(&caps[1], "interval start")?;
        let stop = parse_float(&caps[2], "interval stop")?;
        let bits_per_sec = units::scale(&caps[3], &caps[4])?;
        trace!(
            "Bandwidth report: {}-{} sec, {} bits/sec",
            start, stop, bits_per_sec
        );
        Ok(Some(BandwidthReport {
            start,
            stop,
            bits_per_sec,
        }))
    }
}

fn parse_float(token: &str, field: &'static str) -> Result<f64> {
    token.parse().map_err(|_| AnalysisError::MalformedNumber {
        line: None,
        field,
        token: token.to_string(),
    })
}

fn parse_counter(token: &str, field: &'static str) -> Result<u64> {
    token.parse().map_err(|_| AnalysisError::MalformedNumber {
        line: None,
        field,
        token: token.to_string(),
    })
}

/// Parses an interface line: name, then rx bytes in the first column and tx
/// bytes in the ninth, whitespace collapsed and the name's colon stripped
fn parse_interface_line(line: &str) -> Result<LineKind> {
    let trimmed = line.trim();
    let (name, columns): (&str, Vec<&str>) = match trimmed.split_once(':') {
        Some((name, rest)) => (name.trim(), rest.split_whitespace().collect()),
        None => {
            let mut fields = trimmed.split_whitespace();
            let name = fields.next().unwrap_or("");
            (name, fields.collect())
        }
    };

    if name.is_empty() || columns.len() <= TX_BYTES_COLUMN {
        return Err(AnalysisError::MalformedCounterLine {
            line: None,
            kind: "interface",
            reason: format!(
                "expected at least {} counter columns, found {}",
                TX_BYTES_COLUMN + 1,
                columns.len()
            ),
        });
    }

    let rx_bytes = parse_counter(columns[0], "rx bytes")?;
    let tx_bytes = parse_counter(columns[TX_BYTES_COLUMN], "tx bytes")?;
    trace!(
        "Interface counters: {} rx={} tx={}",
        name, rx_bytes, tx_bytes
    );

    Ok(LineKind::InterfaceCounters {
        interface: name.to_string(),
        rx_bytes,
        tx_bytes,
    })
}

fn parse_cpu_line(line: &str) -> Result<LineKind> {
    let fields: Vec<&str> = line.split_whitespace().skip(1).collect();
    if !CPU_FIELDS.contains(&fields.len()) {
        return Err(AnalysisError::MalformedCounterLine {
            line: None,
            kind: "cpu",
            reason: format!(
                "expected {} or {} categories, found {}",
                CPU_FIELDS[0],
                CPU_FIELDS[1],
                fields.len()
            ),
        });
    }

    let counters = fields
        .iter()
        .map(|field| parse_counter(field, "cpu jiffies"))
        .collect::<Result<Vec<u64>>>()?;
    trace!("CPU counters: {:?}", counters);

    Ok(LineKind::CpuCounters(counters))
}
