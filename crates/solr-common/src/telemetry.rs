//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an env filter and either a
//! human readable or a JSON formatter.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,solr=debug,kube=info,tower=warn,hyper=warn";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Configuration for telemetry initialization
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Emit JSON lines instead of the pretty formatter
    pub json: bool,
    /// Explicit filter directives, overriding `RUST_LOG`
    pub filter: Option<String>,
}

/// Initialize the global tracing subscriber
pub fn init_tracing(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match config.filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let fmt_layer = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_plain_text() {
        let config = TelemetryConfig::default();
        assert!(!config.json);
        assert!(config.filter.is_none());
    }

    #[test]
    fn second_init_reports_an_error() {
        let _ = init_tracing(TelemetryConfig {
            json: false,
            filter: Some("warn".to_string()),
        });
        let again = init_tracing(TelemetryConfig::default());
        assert!(matches!(again, Err(TelemetryError::SubscriberInit(_))));
    }
}
