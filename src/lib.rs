//! Offline analysis of multi-pair network experiment logs
//!
//! See [`analysis`] for the log formats and the processing stages.

pub mod analysis;
pub mod cli;
pub mod settings;
