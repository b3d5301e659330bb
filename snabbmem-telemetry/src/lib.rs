//! # snabbmem telemetry
//!
//! Logging bootstrap and metrics export for the memory subsystem.

pub mod logging;
pub mod metrics;

pub use logging::AllocLogger;
pub use metrics::MetricsRecorder;
