//! Cross-module tests for log analysis
//!
//! Unit tests live next to the code they cover; the modules here exercise
//! several stages together, from raw log text to aggregated windows.

pub mod report_tests;
