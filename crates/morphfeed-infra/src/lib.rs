//! Morphfeed Infrastructure Library
//!
//! Shared process-level setup used by the Morphfeed binaries:
//! - Telemetry initialization (tracing subscriber, text or JSON output)

pub mod telemetry;

pub use telemetry::{init_telemetry, LogFormat, DEFAULT_LOG_FILTER};
