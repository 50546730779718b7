//! API Configuration Module
//!
//! This module provides configuration for the HTTP surface: bind address,
//! CORS origins, and the deployment environment. Configuration is loaded from
//! environment variables with sensible defaults for development.

use std::net::SocketAddr;
use thiserror::Error;

use crate::constants::{DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_PORT, LOCAL_DEV_ORIGINS};

// ============================================================================
// CONFIG ERRORS
// ============================================================================

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .names.join(", "))]
    Missing { names: Vec<&'static str> },

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0}")]
    Unsafe(&'static str),
}

/// Read an optional variable, treating blank values as unset.
pub(crate) fn lookup_trimmed<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional variable, falling back to `default` when unset.
pub(crate) fn lookup_parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup_trimmed(lookup, name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// Parse an optional boolean variable ("true"/"false"/"1"/"0").
pub(crate) fn lookup_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup_trimmed(lookup, name) {
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
        None => Ok(default),
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP surface configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address the server listens on.
    pub bind_addr: SocketAddr,

    /// Deployment environment name (`production`, `development`, ...).
    pub environment: String,

    /// Frontend origin from `FRONTEND_URL`, if configured.
    pub frontend_url: Option<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            environment: "development".to_string(),
            frontend_url: None,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HENRY_API_BIND`: Full socket address (takes precedence over `PORT`)
    /// - `PORT`: Listen port on 0.0.0.0 (default: 3000)
    /// - `HENRY_ENVIRONMENT`: Deployment environment (default: development)
    /// - `FRONTEND_URL`: Origin of the web frontend
    /// - `HENRY_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = match lookup_trimmed(&lookup, "HENRY_API_BIND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "HENRY_API_BIND",
                value,
            })?,
            None => {
                let port = lookup_parsed(&lookup, "PORT", DEFAULT_PORT)?;
                let raw = format!("{}:{}", DEFAULT_BIND_HOST, port);
                raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "PORT",
                    value: raw,
                })?
            }
        };

        let config = Self {
            bind_addr,
            environment: lookup_trimmed(&lookup, "HENRY_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
            frontend_url: lookup_trimmed(&lookup, "FRONTEND_URL"),
            cors_max_age_secs: lookup_parsed(
                &lookup,
                "HENRY_CORS_MAX_AGE_SECS",
                DEFAULT_CORS_MAX_AGE_SECS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Production deployments must name their frontend origin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.frontend_url.is_none() {
            return Err(ConfigError::Unsafe(
                "FRONTEND_URL must be set when HENRY_ENVIRONMENT=production",
            ));
        }
        Ok(())
    }

    /// Allowed CORS origins: the frontend plus the local development origins.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self.frontend_url.iter().cloned().collect();
        for origin in LOCAL_DEV_ORIGINS {
            if !origins.iter().any(|o| o == origin) {
                origins.push((*origin).to_string());
            }
        }
        origins
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins().iter().any(|allowed| allowed == origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(!config.is_production());
        assert_eq!(config.cors_max_age_secs, 86400);
    }

    #[test]
    fn test_port_and_bind() -> Result<(), ConfigError> {
        let config = ApiConfig::from_lookup(env(&[("PORT", "7071")]))?;
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:7071");

        let config = ApiConfig::from_lookup(env(&[
            ("PORT", "7071"),
            ("HENRY_API_BIND", "127.0.0.1:9000"),
        ]))?;
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        Ok(())
    }

    #[test]
    fn test_invalid_port() {
        let err = ApiConfig::from_lookup(env(&[("PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "PORT",
                value: "http".to_string()
            }
        );
    }

    #[test]
    fn test_cors_origins_include_local_dev() -> Result<(), ConfigError> {
        let config =
            ApiConfig::from_lookup(env(&[("FRONTEND_URL", "https://henry.example.com")]))?;
        assert_eq!(
            config.cors_origins(),
            vec![
                "https://henry.example.com".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ]
        );
        assert!(config.is_origin_allowed("http://localhost:8080"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        Ok(())
    }

    #[test]
    fn test_cors_origins_deduplicate() -> Result<(), ConfigError> {
        let config = ApiConfig::from_lookup(env(&[("FRONTEND_URL", "http://localhost:3000")]))?;
        assert_eq!(config.cors_origins().len(), 2);
        Ok(())
    }

    #[test]
    fn test_production_requires_frontend() {
        let err = ApiConfig::from_lookup(env(&[("HENRY_ENVIRONMENT", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::Unsafe(_)));

        let ok = ApiConfig::from_lookup(env(&[
            ("HENRY_ENVIRONMENT", "Production"),
            ("FRONTEND_URL", "https://henry.example.com"),
        ]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_lookup_bool() {
        let lookup = env(&[("A", "TRUE"), ("B", "0"), ("C", "maybe"), ("D", "  ")]);
        assert_eq!(lookup_bool(&lookup, "A", false), Ok(true));
        assert_eq!(lookup_bool(&lookup, "B", true), Ok(false));
        assert!(lookup_bool(&lookup, "C", false).is_err());
        assert_eq!(lookup_bool(&lookup, "D", true), Ok(true));
    }
}
