//! Cross-flow window alignment
//!
//! Groups interval records from many flows by their `(start, stop)` window and
//! refuses to hand on a window set in which flows reported unequal numbers of
//! windows.

use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::errors::{AnalysisError, AnalysisWarning, Diagnostics, Result};
use super::records::{FlowSeries, SourceId};
use super::validation::same_boundary;

/// Default tolerance, in seconds, for treating two boundaries as the same
pub const DEFAULT_ALIGN_TOLERANCE: f64 = 1e-6;

/// A `(start, stop)` window usable as an ordered map key
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowKey {
    pub start: f64,
    pub stop: f64,
}

impl WindowKey {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }
}

impl PartialEq for WindowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WindowKey {}

impl PartialOrd for WindowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WindowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then_with(|| self.stop.total_cmp(&other.stop))
    }
}

/// Per-window values from every flow that reported the window, ordered by start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedWindows {
    windows: BTreeMap<WindowKey, Vec<(SourceId, f64)>>,
}

impl AlignedWindows {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, start: f64, stop: f64) -> Option<&[(SourceId, f64)]> {
        self.windows
            .get(&WindowKey::new(start, stop))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WindowKey, &[(SourceId, f64)])> {
        self.windows.iter().map(|(key, values)| (key, values.as_slice()))
    }

    /// Values only, per window
    pub fn values(&self) -> impl Iterator<Item = (&WindowKey, Vec<f64>)> {
        self.windows
            .iter()
            .map(|(key, values)| (key, values.iter().map(|(_, v)| *v).collect()))
    }
}

impl FromIterator<(WindowKey, Vec<(SourceId, f64)>)> for AlignedWindows {
    fn from_iter<T: IntoIterator<Item = (WindowKey, Vec<(SourceId, f64)>)>>(iter: T) -> Self {
        Self {
            windows: iter.into_iter().collect(),
        }
    }
}

/// Lines up interval series from several flows window by window
#[derive(Debug, Clone, Copy)]
pub struct FlowSeriesAligner {
    tolerance: f64,
}

impl Default for FlowSeriesAligner {
    fn default() -> Self {
        Self::new(DEFAULT_ALIGN_TOLERANCE)
    }
}

impl FlowSeriesAligner {
    /// Creates an aligner that treats boundaries within `tolerance` seconds
    /// as equal
    ///
    /// # Arguments
    ///
    /// * `tolerance` - Seconds; `0.0` requires exact matches. Launch jitter
    ///   between flows is absorbed by raising it.
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Groups every flow's records by window
    ///
    /// Flows are visited in id order and records in series order. The first
    /// record seen for a start establishes that window's stop; a later record
    /// with the same start but a different stop is dropped with an
    /// [`AnalysisWarning::InconsistentInterval`], never merged.
    ///
    /// Fails with [`AnalysisError::InconsistentWindowCount`] when any window
    /// holds fewer values than the fullest window, or fewer values than there
    /// are flows. A flow with no records at all therefore fails alignment as
    /// soon as any other flow reported a window.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use pair_intervals::analysis::alignment::FlowSeriesAligner;
    /// use pair_intervals::analysis::errors::Diagnostics;
    /// use pair_intervals::analysis::records::{FlowSeries, IntervalRecord, SourceId};
    ///
    /// let mut flows = BTreeMap::new();
    /// for (id, offset, value) in [("h1", 0.0, 10.0), ("h2", 0.0004, 12.0)] {
    ///     let mut series = FlowSeries::new(SourceId::new(id));
    ///     series.push(IntervalRecord::new(offset, 0.5 + offset, value));
    ///     flows.insert(SourceId::new(id), series);
    /// }
    ///
    /// let mut diagnostics = Diagnostics::new();
    /// let windows = FlowSeriesAligner::new(1e-3).align(&flows, &mut diagnostics).unwrap();
    /// assert_eq!(windows.len(), 1);
    /// assert_eq!(windows.get(0.0, 0.5).unwrap().len(), 2);
    ///
    /// assert!(FlowSeriesAligner::new(0.0).align(&flows, &mut diagnostics).is_err());
    /// ```
    pub fn align(
        &self,
        series_by_flow: &BTreeMap<SourceId, FlowSeries>,
        diagnostics: &mut Diagnostics,
    ) -> Result<AlignedWindows> {
        let mut windows: BTreeMap<WindowKey, Vec<(SourceId, f64)>> = BTreeMap::new();

        for (flow, series) in series_by_flow {
            for record in series.iter() {
                match self.established_window(&windows, record.start) {
                    Some(key) if same_boundary(key.stop, record.stop, self.tolerance) => {
                        if let Some(values) = windows.get_mut(&key) {
                            values.push((flow.clone(), record.value));
                        }
                    }
                    Some(key) => diagnostics.record(AnalysisWarning::InconsistentInterval {
                        flow: flow.clone(),
                        start: record.start,
                        stop: record.stop,
                        established_stop: key.stop,
                    }),
                    None => {
                        windows.insert(
                            WindowKey::new(record.start, record.stop),
                            vec![(flow.clone(), record.value)],
                        );
                    }
                }
            }
        }

        // Every flow must appear in every window, including flows that
        // reported nothing at all.
        let expected = windows
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(series_by_flow.len());
        if let Some((key, values)) = windows.iter().find(|(_, values)| values.len() != expected) {
            let missing = series_by_flow
                .keys()
                .filter(|flow| !values.iter().any(|(reported, _)| reported == *flow))
                .cloned()
                .collect();
            return Err(AnalysisError::InconsistentWindowCount {
                start: key.start,
                stop: key.stop,
                count: values.len(),
                expected,
                missing,
            });
        }

        debug!(
            "Aligned {} flows into {} windows of {} values",
            series_by_flow.len(),
            windows.len(),
            expected
        );

        Ok(AlignedWindows { windows })
    }

    /// The already-established window whose start lies within tolerance of `start`
    fn established_window(
        &self,
        windows: &BTreeMap<WindowKey, Vec<(SourceId, f64)>>,
        start: f64,
    ) -> Option<WindowKey> {
        let low = WindowKey::new(start - self.tolerance, f64::NEG_INFINITY);
        let high = WindowKey::new(start + self.tolerance, f64::INFINITY);
        windows.range(low..=high).next().map(|(key, _)| *key)
    }
}
