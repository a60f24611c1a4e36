//! Per-run report assembly
//!
//! A run is one experiment at a fixed flow count: one bandwidth log per flow
//! and one counter log for the whole system. The report gathers everything
//! derived from those logs into a single serializable record.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregation::aggregate_flows;
use super::alignment::FlowSeriesAligner;
use super::bandwidth::FlowLog;
use super::counters::CounterLog;
use super::deltas::{DeltaSeriesBuilder, rx_bandwidth_series};
use super::errors::{AnalysisError, AnalysisWarning, Diagnostics, Result};
use super::records::{
    AggregatedWindow, CounterSample, CpuCategory, CpuWindow, IntervalRecord, SourceId,
};

/// Everything measured for one flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow: SourceId,
    /// iperf interval readings in Mbps
    pub intervals: Vec<IntervalRecord>,
    /// iperf whole-run average in Mbps, absent when the log had no summary
    pub total_bandwidth: Option<f64>,
    /// Interface on the receiving side whose counters were sampled
    pub destination_interface: Option<SourceId>,
    /// `[rx_bytes, tx_bytes]` samples of the destination interface
    pub destination_samples: Vec<CounterSample>,
    /// Receive bandwidth in Mbps derived from the destination samples
    pub rx_intervals: Vec<IntervalRecord>,
}

impl FlowReport {
    pub fn mean_interval_bandwidth(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        Some(self.intervals.iter().map(|r| r.value).sum::<f64>() / self.intervals.len() as f64)
    }
}

/// Sum of per-flow totals, together with the flows that had none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthTotal {
    pub total: f64,
    pub unavailable: Vec<SourceId>,
}

impl BandwidthTotal {
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }
}

/// Complete analysis of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of concurrent flows in the run
    pub pairs: usize,
    pub generated_at: DateTime<Utc>,
    pub flows: Vec<FlowReport>,
    pub cpu: Vec<CpuWindow>,
    /// iperf intervals reduced across flows
    pub interval_totals: Vec<AggregatedWindow>,
    /// Receive bandwidth reduced across flows, when every flow has one
    pub rx_totals: Option<Vec<AggregatedWindow>>,
    pub warnings: Vec<AnalysisWarning>,
}

impl RunReport {
    /// Builds the report for one run
    ///
    /// `destinations` maps a flow to the interface whose counters measure what
    /// it received; flows without an entry get no receive series.
    ///
    /// # Arguments
    ///
    /// * `pairs` - Number of concurrent flows the run was started with
    /// * `flow_logs` - One parsed bandwidth log per flow
    /// * `counters` - The run's parsed counter log
    /// * `destinations` - Flow id to receiving interface
    /// * `aligner` - Alignment used for both interval and receive totals
    /// * `diagnostics` - Warnings collected while parsing; moved into the report
    ///
    /// # Returns
    ///
    /// The report, or an error when the flows' own interval series do not
    /// align or `destinations` names an unknown flow. Receive series that do
    /// not align only leave `rx_totals` empty with an
    /// [`AnalysisWarning::IncompleteReceiveTotals`].
    pub fn build(
        pairs: usize,
        flow_logs: Vec<FlowLog>,
        counters: &CounterLog,
        destinations: &BTreeMap<SourceId, SourceId>,
        aligner: &FlowSeriesAligner,
        mut diagnostics: Diagnostics,
    ) -> Result<Self> {
        if let Some(unknown) = destinations
            .keys()
            .find(|flow| !flow_logs.iter().any(|log| &log.flow == *flow))
        {
            return Err(AnalysisError::UnknownFlow(unknown.clone()));
        }

        let rates = DeltaSeriesBuilder::interface_rates();
        let mut interval_series = BTreeMap::new();
        let mut rx_series = BTreeMap::new();
        let mut flows = Vec::with_capacity(flow_logs.len());

        for log in flow_logs {
            let destination_interface = destinations.get(&log.flow).cloned();
            let mut destination_samples = Vec::new();
            let mut rx_intervals = Vec::new();

            if let Some(interface) = &destination_interface {
                match counters.interface(interface) {
                    Some(samples) => {
                        let deltas = rates.build(interface, samples, &mut diagnostics);
                        let rx = rx_bandwidth_series(&log.flow, &deltas, &mut diagnostics);
                        destination_samples = samples.to_vec();
                        rx_intervals = rx.records.clone();
                        rx_series.insert(log.flow.clone(), rx);
                    }
                    None => diagnostics.record(AnalysisWarning::MissingInterface {
                        flow: log.flow.clone(),
                        interface: interface.clone(),
                    }),
                }
            }

            flows.push(FlowReport {
                flow: log.flow.clone(),
                intervals: log.series.records.clone(),
                total_bandwidth: log.total_bandwidth,
                destination_interface,
                destination_samples,
                rx_intervals,
            });
            interval_series.insert(log.flow, log.series);
        }

        let cpu = DeltaSeriesBuilder::cpu_shares()
            .build(&SourceId::cpu(), &counters.cpu, &mut diagnostics)
            .iter()
            .map(CpuWindow::from_delta)
            .collect();

        let interval_totals = aggregate_flows(&interval_series, aligner, &mut diagnostics)?;
        let rx_totals = if !flows.is_empty() && rx_series.len() == flows.len() {
            match aggregate_flows(&rx_series, aligner, &mut diagnostics) {
                Ok(windows) => Some(windows),
                // Counter resets leave holes in receive series; that loses the
                // receive totals but never the run.
                Err(AnalysisError::InconsistentWindowCount {
                    start,
                    stop,
                    missing,
                    ..
                }) => {
                    diagnostics.record(AnalysisWarning::IncompleteReceiveTotals {
                        start,
                        stop,
                        missing,
                    });
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            debug!(
                "Receive totals skipped: {} of {} flows have receive series",
                rx_series.len(),
                flows.len()
            );
            None
        };

        info!(
            "Run with {} pairs: {} flows, {} aggregated windows, {} warnings",
            pairs,
            flows.len(),
            interval_totals.len(),
            diagnostics.len()
        );

        Ok(Self {
            pairs,
            generated_at: Utc::now(),
            flows,
            cpu,
            interval_totals,
            rx_totals,
            warnings: diagnostics.into_warnings(),
        })
    }

    /// Sum of every flow's whole-run bandwidth; flows without one are listed,
    /// never estimated
    pub fn total_bandwidth(&self) -> BandwidthTotal {
        let mut total = 0.0;
        let mut unavailable = Vec::new();
        for flow in &self.flows {
            match flow.total_bandwidth {
                Some(mbps) => total += mbps,
                None => unavailable.push(flow.flow.clone()),
            }
        }
        BandwidthTotal { total, unavailable }
    }

    /// Mean whole-run bandwidth over the flows that reported one
    pub fn mean_flow_bandwidth(&self) -> Option<f64> {
        let totals: Vec<f64> = self.flows.iter().filter_map(|f| f.total_bandwidth).collect();
        if totals.is_empty() {
            return None;
        }
        Some(totals.iter().sum::<f64>() / totals.len() as f64)
    }

    /// Mean share of one CPU category across the windows where it is available
    pub fn mean_cpu_share(&self, category: CpuCategory) -> Option<f64> {
        let shares: Vec<f64> = self.cpu.iter().filter_map(|w| w.share(category)).collect();
        if shares.is_empty() {
            return None;
        }
        Some(shares.iter().sum::<f64>() / shares.len() as f64)
    }

    pub fn flow(&self, flow: &SourceId) -> Option<&FlowReport> {
        self.flows.iter().find(|f| &f.flow == flow)
    }
}
