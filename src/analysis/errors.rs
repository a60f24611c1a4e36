//! Error and warning types for log analysis
//!
//! Fatal conditions abort the analysis of one run and surface as [`AnalysisError`].
//! Everything else is recorded as an [`AnalysisWarning`] in a caller-owned
//! [`Diagnostics`] collection, logged at the moment it is detected, and the run
//! continues.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::records::SourceId;

/// Fatal analysis failures
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// The numeric part of a bandwidth token could not be parsed
    #[error("malformed bandwidth magnitude '{token}'")]
    MalformedUnit { token: String },

    /// A numeric token inside an otherwise matched line could not be parsed
    #[error("unparsable {field} '{token}'{}", describe_line(.line))]
    MalformedNumber {
        line: Option<usize>,
        field: &'static str,
        token: String,
    },

    /// A counter line matched but does not have the expected column layout
    #[error("malformed {kind} counter line{}: {reason}", describe_line(.line))]
    MalformedCounterLine {
        line: Option<usize>,
        kind: &'static str,
        reason: String,
    },

    /// Aligned windows disagree on how many flows reported into them
    #[error(
        "inconsistent interval set: window {start}-{stop} has {count} values, expected {expected} (missing flows: {missing:?})"
    )]
    InconsistentWindowCount {
        start: f64,
        stop: f64,
        count: usize,
        expected: usize,
        missing: Vec<SourceId>,
    },

    /// A flow id was referenced that the analysis was never given
    #[error("unknown flow '{0}'")]
    UnknownFlow(SourceId),
}

impl AnalysisError {
    /// Attaches a 1-based line number to line-level errors
    pub fn at_line(self, number: usize) -> Self {
        match self {
            AnalysisError::MalformedNumber { field, token, .. } => AnalysisError::MalformedNumber {
                line: Some(number),
                field,
                token,
            },
            AnalysisError::MalformedCounterLine { kind, reason, .. } => {
                AnalysisError::MalformedCounterLine {
                    line: Some(number),
                    kind,
                    reason,
                }
            }
            other => other,
        }
    }
}

fn describe_line(line: &Option<usize>) -> String {
    line.map(|n| format!(" at line {}", n)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Non-fatal conditions detected while extracting or reducing series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// A bandwidth log contained no whole-run summary line
    MissingSummary { flow: SourceId },
    /// A counter line appeared before any timestamp marker and was discarded
    NoTimestamp { line: usize },
    /// Two consecutive counter samples share a timestamp
    ZeroDurationWindow { source: SourceId, at: f64 },
    /// No CPU time elapsed between two snapshots
    ZeroCpuTotal { start: f64, stop: f64 },
    /// A cumulative counter went backwards between two samples
    CounterWraparound {
        source: SourceId,
        counter: usize,
        start: f64,
        stop: f64,
    },
    /// A bandwidth report whose window length differs from the sampling interval
    NonUniformInterval {
        flow: SourceId,
        start: f64,
        stop: f64,
        expected: f64,
    },
    /// A window whose start is already claimed by a window with a different stop
    InconsistentInterval {
        flow: SourceId,
        start: f64,
        stop: f64,
        established_stop: f64,
    },
    /// A receive rate could not be derived for one window
    UnavailableRate { flow: SourceId, start: f64, stop: f64 },
    /// A flow's destination interface never appeared in the counter log
    MissingInterface { flow: SourceId, interface: SourceId },
    /// Receive series did not cover the same windows, so no receive totals
    /// were produced for the run
    IncompleteReceiveTotals {
        start: f64,
        stop: f64,
        missing: Vec<SourceId>,
    },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::MissingSummary { flow } => {
                write!(f, "flow '{}': total bandwidth missing from log", flow)
            }
            AnalysisWarning::NoTimestamp { line } => {
                write!(f, "line {}: counter line before any timestamp marker", line)
            }
            AnalysisWarning::ZeroDurationWindow { source, at } => {
                write!(f, "'{}': zero-length sampling window at {:.3}s", source, at)
            }
            AnalysisWarning::ZeroCpuTotal { start, stop } => {
                write!(f, "cpu: no jiffies elapsed in window {}-{}", start, stop)
            }
            AnalysisWarning::CounterWraparound {
                source,
                counter,
                start,
                stop,
            } => write!(
                f,
                "'{}': counter {} decreased in window {}-{}",
                source, counter, start, stop
            ),
            AnalysisWarning::NonUniformInterval {
                flow,
                start,
                stop,
                expected,
            } => write!(
                f,
                "flow '{}': ignoring interval {}-{} (expected length {})",
                flow, start, stop, expected
            ),
            AnalysisWarning::InconsistentInterval {
                flow,
                start,
                stop,
                established_stop,
            } => write!(
                f,
                "flow '{}': ignoring bad interval {}-{} (window at {} ends at {})",
                flow, start, stop, start, established_stop
            ),
            AnalysisWarning::UnavailableRate { flow, start, stop } => {
                write!(f, "flow '{}': no receive rate for window {}-{}", flow, start, stop)
            }
            AnalysisWarning::MissingInterface { flow, interface } => write!(
                f,
                "flow '{}': interface '{}' not found in counter log",
                flow, interface
            ),
            AnalysisWarning::IncompleteReceiveTotals {
                start,
                stop,
                missing,
            } => write!(
                f,
                "receive totals dropped: window {}-{} missing from {:?}",
                start, stop, missing
            ),
        }
    }
}

/// Warnings collected over one analysis run
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    warnings: Vec<AnalysisWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the warning and keeps it for the run report
    pub fn record(&mut self, warning: AnalysisWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[AnalysisWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of recorded warnings matching the predicate
    pub fn count(&self, predicate: impl Fn(&AnalysisWarning) -> bool) -> usize {
        self.warnings.iter().filter(|w| predicate(w)).count()
    }

    pub fn into_warnings(self) -> Vec<AnalysisWarning> {
        self.warnings
    }
}
