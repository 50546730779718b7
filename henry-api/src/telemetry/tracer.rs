//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! JSON or a human-readable fmt layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::lookup_trimmed;
use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "henry_api=debug,tower_http=debug,info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") || value.eq_ignore_ascii_case("pretty") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Fmt layer output (`HENRY_LOG_FORMAT`)
    pub format: LogFormat,
    /// Service name reported in the startup event
    pub service_name: String,
    /// Deployment environment (`HENRY_ENVIRONMENT`)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            service_name: "henry-api".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            format: lookup_trimmed(&lookup, "HENRY_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.format),
            service_name: lookup_trimmed(&lookup, "HENRY_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            environment: lookup_trimmed(&lookup, "HENRY_ENVIRONMENT")
                .unwrap_or(defaults.environment),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before any events are emitted. A second call fails
/// because a global subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        environment = config.environment,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::from_lookup(env(&[]));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.service_name, "henry-api");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_log_format_selection() {
        let config = TelemetryConfig::from_lookup(env(&[("HENRY_LOG_FORMAT", "TEXT")]));
        assert_eq!(config.format, LogFormat::Text);

        let config = TelemetryConfig::from_lookup(env(&[("HENRY_LOG_FORMAT", "json")]));
        assert_eq!(config.format, LogFormat::Json);

        let config = TelemetryConfig::from_lookup(env(&[("HENRY_LOG_FORMAT", "xml")]));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever call wins installs the subscriber; the other must error.
        let first = init_tracing(&TelemetryConfig::default());
        let second = init_tracing(&TelemetryConfig::default());
        assert!(first.is_err() || second.is_err());
    }
}
