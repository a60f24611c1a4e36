//! Offline analysis of per-pair experiment logs
//!
//! A run of the experiment produces one iperf-style bandwidth log per flow and
//! one periodic counter log (interface byte counters and CPU jiffies) for the
//! whole system. This module turns those logs into aligned interval series and
//! reduces them across flows.
//!
//! ## Module Organization
//!
//! - `lines`: line classification shared by both log kinds
//! - `units`: rate tokens with decimal k/m/g prefixes
//! - `bandwidth`: interval and summary extraction from bandwidth logs
//! - `counters`: timestamped samples from counter logs
//! - `deltas`: rates and CPU shares from consecutive samples
//! - `alignment`: grouping of flow records by window
//! - `aggregation`: per-window totals and population variance
//! - `reporting`: the per-run report
//! - `records`, `errors`, `validation`, `formatting`: shared types and helpers
//!
//! ## Usage
//!
//! ```rust
//! use pair_intervals::analysis::{BandwidthLineExtractor, Diagnostics, SourceId, parse_flow_log};
//!
//! let log = "[  3]  0.0- 0.5 sec   384 KBytes  6.29 Mbits/sec\n\
//!            [  3]  0.0-10.0 sec  7.50 MBytes  6.29 Mbits/sec";
//! let extractor = BandwidthLineExtractor::new(0.5, 10.0);
//! let mut diagnostics = Diagnostics::new();
//! let flow = parse_flow_log(SourceId::new("h1"), log.lines(), &extractor, &mut diagnostics)?;
//!
//! assert_eq!(flow.series.len(), 1);
//! assert!(flow.total_bandwidth.is_some());
//! # Ok::<(), pair_intervals::analysis::AnalysisError>(())
//! ```

pub mod aggregation;
pub mod alignment;
pub mod bandwidth;
pub mod counters;
pub mod deltas;
pub mod errors;
pub mod formatting;
pub mod lines;
pub mod records;
pub mod reporting;
pub mod units;
pub mod validation;

pub use aggregation::{WindowAggregator, aggregate_flows, population_variance};
pub use alignment::{AlignedWindows, FlowSeriesAligner, WindowKey};
pub use bandwidth::{BandwidthLineExtractor, BandwidthReading, FlowLog, parse_flow_log};
pub use counters::{CounterLineExtractor, CounterLog, CounterReading, parse_counter_log};
pub use deltas::{DeltaKind, DeltaSeriesBuilder, rx_bandwidth_series};
pub use errors::{AnalysisError, AnalysisWarning, Diagnostics};
pub use lines::{LineClassifier, LineKind};
pub use records::{
    AggregatedWindow, CounterDelta, CounterSample, CpuCategory, CpuWindow, FlowSeries,
    IntervalRecord, SourceId,
};
pub use reporting::{BandwidthTotal, FlowReport, RunReport};
pub use units::scale;

#[cfg(test)]
pub mod tests;
