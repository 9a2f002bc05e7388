//! Offline analysis of persisted controller metrics.
//!
//! Loads a [`MetricsDocument`](ofmetrics_controller::snapshot::MetricsDocument)
//! written by the controller's shutdown handler and turns it into latency,
//! throughput, overhead and distribution figures plus a fixed-layout text
//! report. Missing data is never an error: each section degrades to "no data".

pub mod distribution;
pub mod latency;
pub mod loader;
pub mod overhead;
pub mod report;
pub mod throughput;

pub use latency::LatencyStats;
pub use loader::{load_document, parse_document, AnalyzerError};
pub use report::{analyze, Analysis};
