//! Rates and shares derived from cumulative counter samples
//!
//! Consecutive samples of one source are differenced. Interface byte counters
//! become bits-per-second rates; CPU jiffy counters become the percentage of
//! elapsed jiffies spent in each category.

use log::debug;

use super::errors::{AnalysisWarning, Diagnostics};
use super::records::{CounterDelta, CounterSample, FlowSeries, IntervalRecord, RX_BYTES, SourceId};
use super::validation::{counter_delta, positive_duration, round_to};

/// How a counter difference is turned into a derived value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// Byte counters to bits per second
    InterfaceRate,
    /// Jiffy counters to percent of all jiffies elapsed in the window
    CpuShare,
}

/// Turns one source's cumulative samples into per-window values
///
/// The same builder serves interface counters and CPU counters; [`DeltaKind`]
/// picks the conversion applied to each counter difference.
#[derive(Debug, Clone, Copy)]
pub struct DeltaSeriesBuilder {
    kind: DeltaKind,
}

impl DeltaSeriesBuilder {
    pub fn new(kind: DeltaKind) -> Self {
        Self { kind }
    }

    pub fn interface_rates() -> Self {
        Self::new(DeltaKind::InterfaceRate)
    }

    pub fn cpu_shares() -> Self {
        Self::new(DeltaKind::CpuShare)
    }

    pub fn kind(&self) -> DeltaKind {
        self.kind
    }

    /// Differences consecutive samples of `source`
    ///
    /// Pairs whose timestamps do not advance are skipped, as are CPU windows in
    /// which no jiffies elapsed. A counter that went backwards makes only its
    /// own entry unavailable for that window.
    ///
    /// # Arguments
    ///
    /// * `source` - Interface or CPU the samples belong to, used in warnings
    /// * `samples` - Samples in log order
    /// * `diagnostics` - Receives a warning for every skipped window or counter
    ///
    /// # Returns
    ///
    /// One [`CounterDelta`] per usable pair of consecutive samples. The first
    /// sample is only a baseline.
    ///
    /// # Examples
    ///
    /// ```
    /// use pair_intervals::analysis::deltas::DeltaSeriesBuilder;
    /// use pair_intervals::analysis::errors::Diagnostics;
    /// use pair_intervals::analysis::records::{CounterSample, SourceId};
    ///
    /// let samples = vec![
    ///     CounterSample::new(0.0, vec![0, 0]),
    ///     CounterSample::new(0.5, vec![1000, 250]),
    /// ];
    /// let mut diagnostics = Diagnostics::new();
    /// let deltas = DeltaSeriesBuilder::interface_rates().build(
    ///     &SourceId::new("s1-eth3"),
    ///     &samples,
    ///     &mut diagnostics,
    /// );
    ///
    /// assert_eq!(deltas[0].values, vec![Some(16000.0), Some(4000.0)]);
    /// ```
    pub fn build(
        &self,
        source: &SourceId,
        samples: &[CounterSample],
        diagnostics: &mut Diagnostics,
    ) -> Vec<CounterDelta> {
        let mut deltas = Vec::with_capacity(samples.len().saturating_sub(1));

        for pair in samples.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let (start, stop) = (previous.timestamp, current.timestamp);

            let Some(elapsed) = positive_duration(start, stop) else {
                diagnostics.record(AnalysisWarning::ZeroDurationWindow {
                    source: source.clone(),
                    at: stop,
                });
                continue;
            };

            let differences = counter_differences(source, previous, current, diagnostics);
            let values = match self.kind {
                DeltaKind::InterfaceRate => differences
                    .iter()
                    .map(|d| d.map(|bytes| bytes as f64 * 8.0 / elapsed))
                    .collect(),
                DeltaKind::CpuShare => {
                    let total: u64 = differences.iter().flatten().sum();
                    if total == 0 {
                        diagnostics.record(AnalysisWarning::ZeroCpuTotal { start, stop });
                        continue;
                    }
                    differences
                        .iter()
                        .map(|d| d.map(|jiffies| round_to(jiffies as f64 / total as f64 * 100.0, 2)))
                        .collect()
                }
            };

            deltas.push(CounterDelta {
                start,
                stop,
                values,
            });
        }

        debug!(
            "'{}': {} deltas from {} samples ({:?})",
            source,
            deltas.len(),
            samples.len(),
            self.kind
        );

        deltas
    }
}

/// Per-counter differences, `None` where a counter went backwards or is missing
/// from one of the two samples
fn counter_differences(
    source: &SourceId,
    previous: &CounterSample,
    current: &CounterSample,
    diagnostics: &mut Diagnostics,
) -> Vec<Option<u64>> {
    let width = previous.counters.len().max(current.counters.len());
    (0..width)
        .map(|i| {
            let (Some(&before), Some(&after)) = (previous.counters.get(i), current.counters.get(i))
            else {
                return None;
            };
            let difference = counter_delta(after, before);
            if difference.is_none() {
                diagnostics.record(AnalysisWarning::CounterWraparound {
                    source: source.clone(),
                    counter: i,
                    start: previous.timestamp,
                    stop: current.timestamp,
                });
            }
            difference
        })
        .collect()
}

/// Receive bandwidth in Mbps per window, from an interface rate series
///
/// Windows without a receive rate are skipped with an
/// [`AnalysisWarning::UnavailableRate`].
///
/// # Arguments
///
/// * `flow` - Flow the destination interface measures; the series is keyed by it
/// * `deltas` - Output of [`DeltaSeriesBuilder::interface_rates`] for that interface
/// * `diagnostics` - Receives the skipped windows
pub fn rx_bandwidth_series(
    flow: &SourceId,
    deltas: &[CounterDelta],
    diagnostics: &mut Diagnostics,
) -> FlowSeries {
    let mut series = FlowSeries::new(flow.clone());
    for delta in deltas {
        match delta.value(RX_BYTES) {
            Some(bits_per_sec) => {
                series.push(IntervalRecord::new(delta.start, delta.stop, bits_per_sec / 1e6))
            }
            None => diagnostics.record(AnalysisWarning::UnavailableRate {
                flow: flow.clone(),
                start: delta.start,
                stop: delta.stop,
            }),
        }
    }
    series
}
