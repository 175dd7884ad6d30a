//! Operations and observability.
//!
//! - [`telemetry`] - Logging setup

pub mod telemetry;
