//! Reduction of aligned windows to totals and population variance

use std::collections::BTreeMap;

use super::alignment::{AlignedWindows, FlowSeriesAligner};
use super::errors::{Diagnostics, Result};
use super::records::{AggregatedWindow, FlowSeries, SourceId};

/// Population variance, `(1/n) * sum((v - mean)^2)`; zero for an empty slice
///
/// The values in a window are every flow that was measured, not a sample of
/// them, so the divisor is `n`.
///
/// # Examples
///
/// ```
/// use pair_intervals::analysis::aggregation::population_variance;
///
/// assert_eq!(population_variance(&[10.0, 15.0]), 6.25);
/// assert_eq!(population_variance(&[4.0]), 0.0);
/// assert_eq!(population_variance(&[]), 0.0);
/// ```
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// Square root of the population variance
pub fn std_deviation(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Reduces each aligned window to its total and population variance
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowAggregator;

impl WindowAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One aggregate per window, ascending by start
    ///
    /// # Arguments
    ///
    /// * `aligned` - Output of [`FlowSeriesAligner::align`]
    ///
    /// # Returns
    ///
    /// An [`AggregatedWindow`] per window, carrying the sum, the population
    /// variance and the number of flows that contributed
    pub fn aggregate(&self, aligned: &AlignedWindows) -> Vec<AggregatedWindow> {
        aligned
            .values()
            .map(|(key, values)| AggregatedWindow {
                start: key.start,
                stop: key.stop,
                total: values.iter().sum(),
                variance: population_variance(&values),
                flows: values.len(),
            })
            .collect()
    }
}

/// Aligns the flows and aggregates the result in one step
///
/// # Arguments
///
/// * `series_by_flow` - Interval series keyed by flow
/// * `aligner` - Decides which boundaries count as the same window
/// * `diagnostics` - Receives records dropped for conflicting boundaries
///
/// # Returns
///
/// The aggregated windows, or [`AnalysisError::InconsistentWindowCount`] when
/// the flows did not all report the same windows
///
/// [`AnalysisError::InconsistentWindowCount`]: super::errors::AnalysisError::InconsistentWindowCount
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use pair_intervals::analysis::aggregation::aggregate_flows;
/// use pair_intervals::analysis::alignment::FlowSeriesAligner;
/// use pair_intervals::analysis::errors::Diagnostics;
/// use pair_intervals::analysis::records::{FlowSeries, IntervalRecord, SourceId};
///
/// let mut flows = BTreeMap::new();
/// for (id, value) in [("h1", 10.0), ("h2", 15.0)] {
///     let mut series = FlowSeries::new(SourceId::new(id));
///     series.push(IntervalRecord::new(0.0, 0.5, value));
///     flows.insert(SourceId::new(id), series);
/// }
///
/// let mut diagnostics = Diagnostics::new();
/// let windows = aggregate_flows(&flows, &FlowSeriesAligner::default(), &mut diagnostics).unwrap();
/// assert_eq!(windows[0].total, 25.0);
/// assert_eq!(windows[0].variance, 6.25);
/// ```
pub fn aggregate_flows(
    series_by_flow: &BTreeMap<SourceId, FlowSeries>,
    aligner: &FlowSeriesAligner,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<AggregatedWindow>> {
    let aligned = aligner.align(series_by_flow, diagnostics)?;
    Ok(WindowAggregator::new().aggregate(&aligned))
}
