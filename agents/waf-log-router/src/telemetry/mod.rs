//! Telemetry module for the WAF Log Router
//!
//! - `init_tracing` installs the process-wide `tracing` subscriber
//! - `metrics` holds the Prometheus counters for classification and delivery

pub mod metrics;

pub use metrics::{RouterMetrics, RouterMetricsRegistry};

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Subscriber error: {0}")]
    Subscriber(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable output for local runs
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(TelemetryError::Subscriber(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Logs are written to
/// stderr; stdout is reserved for command output.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}
