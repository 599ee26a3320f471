//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,sxmm=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Resolve the format, letting `RUST_ENV=production` force JSON when
    /// nothing was configured.
    pub fn resolve(configured: Option<LogFormat>) -> LogFormat {
        configured.unwrap_or_else(|| {
            let is_production = std::env::var("RUST_ENV")
                .map(|v| v == "production")
                .unwrap_or(false);
            if is_production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            }
        })
    }
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to `info,sxmm=debug`.
/// Fails if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
