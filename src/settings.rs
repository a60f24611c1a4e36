//! Analysis settings
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`pairstat.toml` in the working directory, or the path in
//! `PAIRSTAT_CONFIG`), then `PAIRSTAT_*` environment variables. Command-line
//! flags are applied last through [`Settings::with_overrides`].

use config::{Config, ConfigError, Environment, File};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::analysis::alignment::{DEFAULT_ALIGN_TOLERANCE, FlowSeriesAligner};
use crate::analysis::bandwidth::BandwidthLineExtractor;
use crate::analysis::counters::CounterLineExtractor;
use crate::analysis::lines::{DEFAULT_INTERFACE_MARKER, LineClassifier};

pub const DEFAULT_CONFIG_NAME: &str = "pairstat";
pub const CONFIG_PATH_VAR: &str = "PAIRSTAT_CONFIG";
pub const ENV_PREFIX: &str = "PAIRSTAT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sampling interval of the bandwidth tool, in seconds
    pub interval: f64,
    /// Whole test duration, in seconds
    pub duration: f64,
    /// Substring identifying interface counter lines
    pub interface_marker: String,
    /// Subtracted from every counter log timestamp
    pub start_time: f64,
    /// Seconds within which two window boundaries are treated as equal
    pub align_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: 0.5,
            duration: 10.0,
            interface_marker: DEFAULT_INTERFACE_MARKER.to_string(),
            start_time: 0.0,
            align_tolerance: DEFAULT_ALIGN_TOLERANCE,
        }
    }
}

impl Settings {
    /// Loads defaults, the settings file and the environment, in that order
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_VAR).ok();
        let (file, required) = match (path, env_path.as_deref()) {
            (Some(path), _) => (File::from(path), true),
            (None, Some(env_path)) => (File::with_name(env_path), true),
            (None, None) => (File::with_name(DEFAULT_CONFIG_NAME), false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file.required(required))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        debug!("Loaded settings: {:?}", settings);
        settings.validate()
    }

    /// Loads defaults and a single settings file, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    /// Applies command-line values on top of the loaded settings
    pub fn with_overrides(
        mut self,
        interval: Option<f64>,
        duration: Option<f64>,
        start_time: Option<f64>,
    ) -> Result<Self> {
        if let Some(interval) = interval {
            self.interval = interval;
        }
        if let Some(duration) = duration {
            self.duration = duration;
        }
        if let Some(start_time) = start_time {
            self.start_time = start_time;
        }
        self.validate()
    }

    /// Checks every field, returning the settings unchanged when they are usable
    ///
    /// `align_tolerance` may be zero, which means window boundaries must
    /// match exactly.
    pub fn validate(self) -> Result<Self> {
        if !(self.interval.is_finite() && self.interval > 0.0) {
            return Err(invalid("interval", format!("must be positive, got {}", self.interval)));
        }
        if !(self.duration.is_finite() && self.duration >= self.interval) {
            return Err(invalid(
                "duration",
                format!(
                    "must be at least the interval ({}), got {}",
                    self.interval, self.duration
                ),
            ));
        }
        if self.interface_marker.trim().is_empty() {
            return Err(invalid("interface_marker", "must not be empty".to_string()));
        }
        if !self.start_time.is_finite() {
            return Err(invalid("start_time", format!("must be finite, got {}", self.start_time)));
        }
        if !(self.align_tolerance.is_finite() && self.align_tolerance >= 0.0) {
            return Err(invalid(
                "align_tolerance",
                format!("must be zero or positive, got {}", self.align_tolerance),
            ));
        }
        Ok(self)
    }

    pub fn classifier(&self) -> LineClassifier {
        LineClassifier::new(self.interface_marker.clone())
    }

    pub fn bandwidth_extractor(&self) -> BandwidthLineExtractor {
        BandwidthLineExtractor::with_classifier(self.classifier(), self.interval, self.duration)
    }

    pub fn counter_extractor(&self) -> CounterLineExtractor {
        CounterLineExtractor::new(self.classifier())
    }

    pub fn aligner(&self) -> FlowSeriesAligner {
        FlowSeriesAligner::new(self.align_tolerance)
    }
}

fn invalid(field: &'static str, reason: String) -> SettingsError {
    SettingsError::Invalid { field, reason }
}
