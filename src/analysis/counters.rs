//! Cumulative counter snapshot extraction
//!
//! A counter log interleaves timestamp markers with per-interface byte
//! counters and the aggregate CPU jiffy counters. Every counter line belongs to
//! the most recent marker.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::{AnalysisWarning, Diagnostics, Result};
use super::lines::{LineClassifier, LineKind};
use super::records::{CounterSample, SourceId};
use super::validation::round_to;

/// Counter-log content of a single line
#[derive(Debug, Clone, PartialEq)]
pub enum CounterReading {
    /// Absolute seconds establishing the timestamp of following counter lines
    Timestamp(f64),
    Interface {
        interface: SourceId,
        rx_bytes: u64,
        tx_bytes: u64,
    },
    /// Jiffies per CPU category, in `/proc/stat` column order
    Cpu(Vec<u64>),
}

/// Picks timestamp markers, interface counters and CPU counters out of a
/// counter log
#[derive(Debug, Clone, Default)]
pub struct CounterLineExtractor {
    classifier: LineClassifier,
}

impl CounterLineExtractor {
    pub fn new(classifier: LineClassifier) -> Self {
        Self { classifier }
    }

    /// Extracts the counter reading carried by `line`, `None` for any other line
    pub fn extract(&self, line: &str) -> Result<Option<CounterReading>> {
        let reading = match self.classifier.classify(line)? {
            LineKind::TimestampMarker(seconds) => Some(CounterReading::Timestamp(seconds)),
            LineKind::InterfaceCounters {
                interface,
                rx_bytes,
                tx_bytes,
            } => Some(CounterReading::Interface {
                interface: SourceId::new(interface),
                rx_bytes,
                tx_bytes,
            }),
            LineKind::CpuCounters(counters) => Some(CounterReading::Cpu(counters)),
            LineKind::BandwidthReport(_) | LineKind::Unmatched => None,
        };
        Ok(reading)
    }
}

/// Samples extracted from one counter log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterLog {
    /// `[rx_bytes, tx_bytes]` samples per interface
    pub interfaces: BTreeMap<SourceId, Vec<CounterSample>>,
    /// Whole-system CPU jiffy samples
    pub cpu: Vec<CounterSample>,
}

impl CounterLog {
    pub fn interface(&self, interface: &SourceId) -> Option<&[CounterSample]> {
        self.interfaces.get(interface).map(Vec::as_slice)
    }
}

/// Parses a complete counter log
///
/// Marker values are made relative to `start_time` and rounded to the
/// millisecond. Counter lines seen before the first marker are discarded with
/// an [`AnalysisWarning::NoTimestamp`].
///
/// # Arguments
///
/// * `lines` - The log, in capture order
/// * `extractor` - Decides which lines are interface or CPU counters
/// * `start_time` - Subtracted from every marker
/// * `diagnostics` - Receives the discarded lines
///
/// # Returns
///
/// Samples grouped per interface plus the CPU samples. A matched line with an
/// unreadable counter fails with its line number.
///
/// # Examples
///
/// ```
/// use pair_intervals::analysis::counters::{CounterLineExtractor, parse_counter_log};
/// use pair_intervals::analysis::errors::Diagnostics;
/// use pair_intervals::analysis::records::SourceId;
///
/// let log = "\
/// 100.5 seconds
/// s1-eth3: 1000 10 0 0 0 0 0 0 400 4 0 0 0 0 0 0
/// cpu  10 0 5 85 0 0 0 0 0 0";
///
/// let mut diagnostics = Diagnostics::new();
/// let parsed = parse_counter_log(
///     log.lines(),
///     &CounterLineExtractor::default(),
///     100.0,
///     &mut diagnostics,
/// )
/// .unwrap();
///
/// let samples = parsed.interface(&SourceId::new("s1-eth3")).unwrap();
/// assert_eq!(samples[0].timestamp, 0.5);
/// assert_eq!(samples[0].counters, vec![1000, 400]);
/// assert_eq!(parsed.cpu.len(), 1);
/// ```
pub fn parse_counter_log<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    extractor: &CounterLineExtractor,
    start_time: f64,
    diagnostics: &mut Diagnostics,
) -> Result<CounterLog> {
    let mut log = CounterLog::default();
    let mut timestamp: Option<f64> = None;

    for (index, line) in lines.into_iter().enumerate() {
        let number = index + 1;
        let Some(reading) = extractor.extract(line).map_err(|e| e.at_line(number))? else {
            continue;
        };

        if let CounterReading::Timestamp(seconds) = reading {
            timestamp = Some(round_to(seconds - start_time, 3));
            continue;
        }

        let Some(at) = timestamp else {
            diagnostics.record(AnalysisWarning::NoTimestamp { line: number });
            continue;
        };

        match reading {
            CounterReading::Interface {
                interface,
                rx_bytes,
                tx_bytes,
            } => log
                .interfaces
                .entry(interface)
                .or_default()
                .push(CounterSample::new(at, vec![rx_bytes, tx_bytes])),
            CounterReading::Cpu(counters) => log.cpu.push(CounterSample::new(at, counters)),
            CounterReading::Timestamp(_) => {}
        }
    }

    debug!(
        "Counter log: {} interfaces, {} cpu samples",
        log.interfaces.len(),
        log.cpu.len()
    );

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::errors::AnalysisError;

    const COUNTER_LOG: &str = "\
1000.25 seconds
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
s1-eth1:    1000      10    0    0    0     0          0         0      500       5    0    0    0     0       0          0
s1-eth2:    2000      20    0    0    0     0          0         0      700       7    0    0    0     0       0          0
cpu  100 0 50 850 0 0 0 0 0 0
1000.75 seconds
s1-eth1:    9000      90    0    0    0     0          0         0     4500      45    0    0    0     0       0          0
s1-eth2:    4000      40    0    0    0     0          0         0      900       9    0    0    0     0       0          0
cpu  200 0 100 1650 0 0 0 0 0 0";

    #[test]
    fn test_extract_readings() {
        let extractor = CounterLineExtractor::default();

        assert_eq!(
            extractor.extract("12.5 seconds").unwrap(),
            Some(CounterReading::Timestamp(12.5))
        );
        assert_eq!(
            extractor
                .extract("h2-eth0: 10 0 0 0 0 0 0 0 20 0")
                .unwrap(),
            Some(CounterReading::Interface {
                interface: SourceId::new("h2-eth0"),
                rx_bytes: 10,
                tx_bytes: 20,
            })
        );
        assert_eq!(
            extractor.extract("cpu 1 2 3 4 5 6 7 8 9").unwrap(),
            Some(CounterReading::Cpu(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]))
        );
        assert_eq!(
            extractor.extract("[ 3] 0.0-0.5 sec 1 Mbits/sec").unwrap(),
            None
        );
        assert_eq!(extractor.extract("intr 12345 0 0").unwrap(), None);
    }

    #[test]
    fn test_parse_counter_log() {
        let mut diagnostics = Diagnostics::new();
        let log = parse_counter_log(
            COUNTER_LOG.lines(),
            &CounterLineExtractor::default(),
            1000.0,
            &mut diagnostics,
        )
        .unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(log.interfaces.len(), 2);

        let eth1 = log.interface(&SourceId::new("s1-eth1")).unwrap();
        assert_eq!(
            eth1,
            &[
                CounterSample::new(0.25, vec![1000, 500]),
                CounterSample::new(0.75, vec![9000, 4500]),
            ]
        );

        assert_eq!(log.cpu.len(), 2);
        assert_eq!(log.cpu[1].timestamp, 0.75);
        assert_eq!(log.cpu[1].counters[3], 1650);
    }

    #[test]
    fn test_counter_lines_before_marker_are_discarded() {
        let text = "\
h1-eth0: 10 0 0 0 0 0 0 0 20 0
cpu 1 2 3 4 5 6 7 8 9
5.0 seconds
h1-eth0: 30 0 0 0 0 0 0 0 40 0";
        let mut diagnostics = Diagnostics::new();
        let log = parse_counter_log(
            text.lines(),
            &CounterLineExtractor::default(),
            0.0,
            &mut diagnostics,
        )
        .unwrap();

        assert!(log.cpu.is_empty());
        assert_eq!(
            log.interface(&SourceId::new("h1-eth0")).unwrap(),
            &[CounterSample::new(5.0, vec![30, 40])]
        );
        assert_eq!(
            diagnostics.warnings(),
            &[
                AnalysisWarning::NoTimestamp { line: 1 },
                AnalysisWarning::NoTimestamp { line: 2 },
            ]
        );
    }

    #[test]
    fn test_elapsed_time_is_rounded_to_milliseconds() {
        let text = "\
1349986321.5234 seconds
cpu 1 2 3 4 5 6 7 8 9";
        let mut diagnostics = Diagnostics::new();
        let log = parse_counter_log(
            text.lines(),
            &CounterLineExtractor::default(),
            1349986321.0,
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(log.cpu[0].timestamp, 0.523);
    }

    #[test]
    fn test_malformed_counter_line_carries_line_number() {
        let text = "\
1.0 seconds
cpu 1 2 3";
        let mut diagnostics = Diagnostics::new();
        let err = parse_counter_log(
            text.lines(),
            &CounterLineExtractor::default(),
            0.0,
            &mut diagnostics,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::MalformedCounterLine {
                line: Some(2),
                kind: "cpu",
                ..
            }
        ));
    }
}
