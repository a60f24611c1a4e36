//! Typed records extracted from measurement logs
//!
//! Every record here is an immutable value produced by a single pass over an
//! already-captured log. Series are ordered by time; nothing is keyed by
//! free-form labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for an interface or a flow, used only for grouping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier used for the whole-system CPU counter source
    pub fn cpu() -> Self {
        Self("cpu".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One measured value over the window `[start, stop)`, times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub start: f64,
    pub stop: f64,
    pub value: f64,
}

impl IntervalRecord {
    pub fn new(start: f64, stop: f64, value: f64) -> Self {
        Self { start, stop, value }
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Interval records reported by one flow, in log order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSeries {
    pub flow: SourceId,
    pub records: Vec<IntervalRecord>,
}

impl FlowSeries {
    pub fn new(flow: SourceId) -> Self {
        Self {
            flow,
            records: Vec::new(),
        }
    }

    pub fn with_records(flow: SourceId, records: Vec<IntervalRecord>) -> Self {
        Self { flow, records }
    }

    pub fn push(&mut self, record: IntervalRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntervalRecord> {
        self.records.iter()
    }

    /// Mean of the per-window values, `None` for an empty series
    pub fn mean_value(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.records.iter().map(|r| r.value).sum::<f64>() / self.records.len() as f64)
    }
}

/// One cumulative-counter snapshot; `timestamp` is elapsed seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSample {
    pub timestamp: f64,
    pub counters: Vec<u64>,
}

impl CounterSample {
    pub fn new(timestamp: f64, counters: Vec<u64>) -> Self {
        Self {
            timestamp,
            counters,
        }
    }
}

/// Position of the receive byte counter in an interface sample
pub const RX_BYTES: usize = 0;
/// Position of the transmit byte counter in an interface sample
pub const TX_BYTES: usize = 1;

/// Rate or share derived from two consecutive samples of one source
///
/// A `None` entry means the value is unavailable for this window, typically
/// because the underlying counter was reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub start: f64,
    pub stop: f64,
    pub values: Vec<Option<f64>>,
}

impl CounterDelta {
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// One window reduced across every flow that reported into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedWindow {
    pub start: f64,
    pub stop: f64,
    pub total: f64,
    pub variance: f64,
    /// Number of flows contributing to the window
    pub flows: usize,
}

impl AggregatedWindow {
    pub fn mean(&self) -> f64 {
        if self.flows == 0 {
            0.0
        } else {
            self.total / self.flows as f64
        }
    }

    pub fn std_deviation(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// CPU time categories of the aggregate `cpu` line, in column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuCategory {
    User,
    Nice,
    System,
    Idle,
    Iowait,
    Irq,
    Softirq,
    Steal,
    Guest,
    GuestNice,
}

impl CpuCategory {
    pub const ALL: [CpuCategory; 10] = [
        CpuCategory::User,
        CpuCategory::Nice,
        CpuCategory::System,
        CpuCategory::Idle,
        CpuCategory::Iowait,
        CpuCategory::Irq,
        CpuCategory::Softirq,
        CpuCategory::Steal,
        CpuCategory::Guest,
        CpuCategory::GuestNice,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CpuCategory::User => "user",
            CpuCategory::Nice => "nice",
            CpuCategory::System => "sys",
            CpuCategory::Idle => "idle",
            CpuCategory::Iowait => "iowait",
            CpuCategory::Irq => "irq",
            CpuCategory::Softirq => "sirq",
            CpuCategory::Steal => "steal",
            CpuCategory::Guest => "guest",
            CpuCategory::GuestNice => "guest_nice",
        }
    }
}

/// CPU usage percentages for one window, one named field per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuWindow {
    pub start: f64,
    pub stop: f64,
    pub user: Option<f64>,
    pub nice: Option<f64>,
    pub system: Option<f64>,
    pub idle: Option<f64>,
    pub iowait: Option<f64>,
    pub irq: Option<f64>,
    pub softirq: Option<f64>,
    pub steal: Option<f64>,
    pub guest: Option<f64>,
    pub guest_nice: Option<f64>,
}

impl CpuWindow {
    pub fn from_delta(delta: &CounterDelta) -> Self {
        let share = |category: CpuCategory| delta.value(category as usize);
        Self {
            start: delta.start,
            stop: delta.stop,
            user: share(CpuCategory::User),
            nice: share(CpuCategory::Nice),
            system: share(CpuCategory::System),
            idle: share(CpuCategory::Idle),
            iowait: share(CpuCategory::Iowait),
            irq: share(CpuCategory::Irq),
            softirq: share(CpuCategory::Softirq),
            steal: share(CpuCategory::Steal),
            guest: share(CpuCategory::Guest),
            guest_nice: share(CpuCategory::GuestNice),
        }
    }

    pub fn share(&self, category: CpuCategory) -> Option<f64> {
        match category {
            CpuCategory::User => self.user,
            CpuCategory::Nice => self.nice,
            CpuCategory::System => self.system,
            CpuCategory::Idle => self.idle,
            CpuCategory::Iowait => self.iowait,
            CpuCategory::Irq => self.irq,
            CpuCategory::Softirq => self.softirq,
            CpuCategory::Steal => self.steal,
            CpuCategory::Guest => self.guest,
            CpuCategory::GuestNice => self.guest_nice,
        }
    }

    /// Share of time not spent idle or waiting on I/O
    pub fn busy(&self) -> Option<f64> {
        Some(100.0 - self.idle? - self.iowait.unwrap_or(0.0))
    }
}
