//! Bandwidth report extraction
//!
//! Turns iperf interval output into a [`FlowSeries`] of Mbps readings plus the
//! whole-run average, if the log carries one.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::errors::{AnalysisWarning, Diagnostics, Result};
use super::lines::LineClassifier;
use super::records::{FlowSeries, IntervalRecord, SourceId};
use super::validation::{is_expected_duration, is_summary_window};

/// What a single bandwidth report line contributes to a flow
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandwidthReading {
    /// A sampling-interval report, value in Mbps
    Interval(IntervalRecord),
    /// Whole-run average bandwidth in Mbps
    Summary(f64),
    /// A report whose window is neither one interval nor the whole run
    Irregular { start: f64, stop: f64 },
}

/// Extracts bandwidth readings for a given sampling interval and test duration
#[derive(Debug, Clone)]
pub struct BandwidthLineExtractor {
    classifier: LineClassifier,
    interval: f64,
    duration: f64,
}

impl BandwidthLineExtractor {
    pub fn new(interval: f64, duration: f64) -> Self {
        Self {
            classifier: LineClassifier::default(),
            interval,
            duration,
        }
    }

    pub fn with_classifier(classifier: LineClassifier, interval: f64, duration: f64) -> Self {
        Self {
            classifier,
            interval,
            duration,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Extracts the reading carried by `line`, `None` if it is not a bandwidth report
    ///
    /// A window exactly one interval long wins over the summary check, so a
    /// run whose duration equals its interval yields interval records.
    pub fn extract(&self, line: &str) -> Result<Option<BandwidthReading>> {
        let Some(report) = self.classifier.classify_bandwidth(line)? else {
            return Ok(None);
        };

        let mbps = report.bits_per_sec / 1e6;
        let reading = if is_expected_duration(report.start, report.stop, self.interval) {
            BandwidthReading::Interval(IntervalRecord::new(report.start, report.stop, mbps))
        } else if is_summary_window(report.start, report.stop, self.duration) {
            BandwidthReading::Summary(mbps)
        } else {
            BandwidthReading::Irregular {
                start: report.start,
                stop: report.stop,
            }
        };
        Ok(Some(reading))
    }
}

/// Everything extracted from one flow's bandwidth log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowLog {
    pub flow: SourceId,
    pub series: FlowSeries,
    /// Whole-run average in Mbps; `None` when the log has no summary line
    pub total_bandwidth: Option<f64>,
}

/// Parses a complete bandwidth log for one flow
///
/// Irregular windows are dropped with a [`AnalysisWarning::NonUniformInterval`];
/// a log without a summary line yields `total_bandwidth: None` and a
/// [`AnalysisWarning::MissingSummary`]. When several summary lines exist the
/// last one wins.
///
/// # Examples
///
/// ```
/// use pair_intervals::analysis::bandwidth::{BandwidthLineExtractor, parse_flow_log};
/// use pair_intervals::analysis::errors::Diagnostics;
/// use pair_intervals::analysis::records::SourceId;
///
/// let log = "\
/// [  3]  0.0- 0.5 sec   640 KBytes  10.0 Mbits/sec
/// [  3]  0.5- 1.0 sec   768 KBytes  12.0 Mbits/sec
/// [  3]  0.0- 1.0 sec  1.38 MBytes  11.0 Mbits/sec";
///
/// let mut diagnostics = Diagnostics::new();
/// let flow = parse_flow_log(
///     SourceId::new("h1"),
///     log.lines(),
///     &BandwidthLineExtractor::new(0.5, 1.0),
///     &mut diagnostics,
/// )
/// .unwrap();
///
/// assert_eq!(flow.series.len(), 2);
/// assert_eq!(flow.total_bandwidth, Some(11.0));
/// ```
pub fn parse_flow_log<'a>(
    flow: SourceId,
    lines: impl IntoIterator<Item = &'a str>,
    extractor: &BandwidthLineExtractor,
    diagnostics: &mut Diagnostics,
) -> Result<FlowLog> {
    let mut series = FlowSeries::new(flow.clone());
    let mut total_bandwidth = None;

    for (index, line) in lines.into_iter().enumerate() {
        let reading = extractor.extract(line).map_err(|e| e.at_line(index + 1))?;
        match reading {
            Some(BandwidthReading::Interval(record)) => series.push(record),
            Some(BandwidthReading::Summary(mbps)) => {
                trace!("Flow '{}': summary bandwidth {} Mbps", flow, mbps);
                total_bandwidth = Some(mbps);
            }
            Some(BandwidthReading::Irregular { start, stop }) => {
                diagnostics.record(AnalysisWarning::NonUniformInterval {
                    flow: flow.clone(),
                    start,
                    stop,
                    expected: extractor.interval(),
                });
            }
            None => {}
        }
    }

    if total_bandwidth.is_none() {
        diagnostics.record(AnalysisWarning::MissingSummary { flow: flow.clone() });
    }

    debug!(
        "Flow '{}': {} intervals, total bandwidth {:?}",
        flow,
        series.len(),
        total_bandwidth
    );

    Ok(FlowLog {
        flow,
        series,
        total_bandwidth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::errors::AnalysisError;

    const IPERF_LOG: &str = "\
------------------------------------------------------------
Client connecting to 10.0.0.2, TCP port 5001
TCP window size: 16.0 KByte (default)
------------------------------------------------------------
[  3] local 10.0.0.1 port 36742 connected with 10.0.0.2 port 5001
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0- 0.5 sec   384 KBytes  6.29 Mbits/sec
[  3]  0.5- 1.0 sec   512 KBytes  8.39 Mbits/sec
[  3]  1.0- 1.5 sec   448 KBytes  7.34 Mbits/sec
[  3]  1.5- 2.0 sec   512 KBytes  8.39 Mbits/sec
[  3]  0.0- 2.0 sec  1.81 MBytes  7.60 Mbits/sec";

    fn extractor() -> BandwidthLineExtractor {
        BandwidthLineExtractor::new(0.5, 2.0)
    }

    #[test]
    fn test_extract_interval_record() {
        let reading = BandwidthLineExtractor::new(0.5, 10.0)
            .extract("[ 3] 2.0-2.5 sec  6.25 Mbits/sec")
            .unwrap();
        assert_eq!(
            reading,
            Some(BandwidthReading::Interval(IntervalRecord::new(2.0, 2.5, 6.25)))
        );
    }

    #[test]
    fn test_extract_summary() {
        let reading = extractor()
            .extract("[  3]  0.0- 2.0 sec  1.81 MBytes  7.60 Mbits/sec")
            .unwrap();
        let Some(BandwidthReading::Summary(mbps)) = reading else {
            panic!("expected summary, got {:?}", reading);
        };
        assert!((mbps - 7.6).abs() < 1e-9);
    }

    #[test]
    fn test_extract_summary_past_duration() {
        let reading = extractor()
            .extract("[  3]  0.0- 2.1 sec  1.81 MBytes  7.24 Mbits/sec")
            .unwrap();
        assert!(matches!(reading, Some(BandwidthReading::Summary(_))));
    }

    #[test]
    fn test_extract_irregular_window() {
        let reading = extractor()
            .extract("[  3]  1.5- 1.9 sec   300 KBytes  6.00 Mbits/sec")
            .unwrap();
        assert_eq!(
            reading,
            Some(BandwidthReading::Irregular {
                start: 1.5,
                stop: 1.9
            })
        );
    }

    #[test]
    fn test_extract_non_report_is_none() {
        assert_eq!(extractor().extract("TCP window size: 16.0 KByte").unwrap(), None);
        assert_eq!(extractor().extract("").unwrap(), None);
    }

    #[test]
    fn test_interval_wins_over_summary() {
        let reading = BandwidthLineExtractor::new(0.5, 0.5)
            .extract("[ 3] 0.0-0.5 sec  5.00 Mbits/sec")
            .unwrap();
        assert!(matches!(reading, Some(BandwidthReading::Interval(_))));
    }

    #[test]
    fn test_parse_flow_log() {
        let mut diagnostics = Diagnostics::new();
        let log = parse_flow_log(
            SourceId::new("h1"),
            IPERF_LOG.lines(),
            &extractor(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(log.series.len(), 4);
        let first = log.series.records[0];
        assert_eq!((first.start, first.stop), (0.0, 0.5));
        assert!((first.value - 6.29).abs() < 1e-9);
        assert_eq!(log.series.records[3].start, 1.5);
        assert!((log.total_bandwidth.unwrap() - 7.6).abs() < 1e-9);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parse_flow_log_without_summary() {
        let mut diagnostics = Diagnostics::new();
        let lines: Vec<&str> = IPERF_LOG.lines().take(9).collect();
        let log = parse_flow_log(SourceId::new("h2"), lines, &extractor(), &mut diagnostics)
            .unwrap();

        assert_eq!(log.total_bandwidth, None);
        assert_eq!(log.series.len(), 3);
        assert_eq!(
            diagnostics.warnings(),
            &[AnalysisWarning::MissingSummary {
                flow: SourceId::new("h2")
            }]
        );
    }

    #[test]
    fn test_parse_flow_log_drops_irregular_windows() {
        let log_text = "\
[ 3] 0.0-0.5 sec  10 Mbits/sec
[ 3] 0.5-0.9 sec  10 Mbits/sec
[ 3] 0.9-1.4 sec  10 Mbits/sec
[ 3] 0.0-2.0 sec  10 Mbits/sec";
        let mut diagnostics = Diagnostics::new();
        let log = parse_flow_log(
            SourceId::new("h1"),
            log_text.lines(),
            &extractor(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(log.series.len(), 2);
        assert_eq!(
            diagnostics.count(|w| matches!(w, AnalysisWarning::NonUniformInterval { .. })),
            1
        );
    }

    #[test]
    fn test_parse_flow_log_ignores_interface_names() {
        let log_text = "\
Binding to local address 10.0.0.1 and iface h1-eth0
[  3] local 10.0.0.1 port 36742 connected with 10.0.0.2 port 5001
[ 3] 0.0-0.5 sec  10 Mbits/sec
[ 3] 0.5-1.0 sec  12 Mbits/sec
[ 3] 0.0-2.0 sec  11 Mbits/sec";
        let mut diagnostics = Diagnostics::new();
        let log = parse_flow_log(
            SourceId::new("h1"),
            log_text.lines(),
            &extractor(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(log.series.len(), 2);
        assert_eq!(log.series.records[1].value, 12.0);
        assert_eq!(log.total_bandwidth, Some(11.0));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parse_flow_log_reports_line_of_bad_token() {
        let log_text = "\
[ 3] 0.0-0.5 sec  10 Mbits/sec
[ 3] 0.5-1.0.0 sec  10 Mbits/sec";
        let mut diagnostics = Diagnostics::new();
        let err = parse_flow_log(
            SourceId::new("h1"),
            log_text.lines(),
            &extractor(),
            &mut diagnostics,
        )
        .unwrap_err();

        assert_eq!(
            err,
            AnalysisError::MalformedNumber {
                line: Some(2),
                field: "interval stop",
                token: "1.0.0".to_string(),
            }
        );
    }
}
