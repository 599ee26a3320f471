//! Prometheus metrics and structured logging for the StandX market maker.
//!
//! - Structured logging with tracing (pretty for development, JSON for production)
//! - Process-global Prometheus counters for cycles, cancels, flattens and placements

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat};
pub use metrics::Metrics;
