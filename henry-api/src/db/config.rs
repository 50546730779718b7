//! Database configuration loaded from the environment.

use std::fmt;
use std::time::Duration;

use crate::config::{lookup_bool, lookup_parsed, lookup_trimmed, ConfigError};
use crate::constants::{
    CONNECTION_RETRY_DELAY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_DB_PORT, DEFAULT_IDLE_TIMEOUT_MS,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MAX_CONNECTION_RETRIES, DEFAULT_POOL_MAX, DEFAULT_POOL_MIN,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::db::manager::RetryPolicy;

const REQUIRED: [&str; 4] = ["DB_SERVER", "DB_DATABASE", "DB_USER", "DB_PASSWORD"];

/// Database configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Require TLS for every connection.
    pub encrypt: bool,
    pub max_size: usize,
    /// Connections opened eagerly when the pool is built. Never above `max_size`.
    pub min_size: usize,
    pub connect_timeout: Duration,
    /// Bound on waiting for a pooled connection and on statement execution.
    pub request_timeout: Duration,
    /// Connections unused for this long are evicted on the keep-alive tick.
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Pool-open attempts before the manager gives up. At least 1.
    pub max_retries: u32,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("max_size", &self.max_size)
            .field("min_size", &self.min_size)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl DbConfig {
    /// Create config from environment variables.
    ///
    /// `DB_SERVER`, `DB_DATABASE`, `DB_USER` and `DB_PASSWORD` are required.
    /// Everything else has a default:
    /// - `DB_PORT` (5432), `DB_ENCRYPT` (false)
    /// - `DB_POOL_MAX` (10), `DB_POOL_MIN` (2)
    /// - `DB_CONNECT_TIMEOUT`, `DB_REQUEST_TIMEOUT` (60000 ms each)
    /// - `DB_IDLE_TIMEOUT` (900000 ms), `DB_KEEPALIVE_INTERVAL` (240000 ms, never 0)
    /// - `DB_MAX_RETRIES` (3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .copied()
            .filter(|name| lookup_trimmed(&lookup, name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing { names: missing });
        }

        let required = |name: &'static str| {
            lookup_trimmed(&lookup, name).ok_or(ConfigError::Missing { names: vec![name] })
        };
        let millis = |name: &'static str, default: u64| {
            lookup_parsed(&lookup, name, default).map(Duration::from_millis)
        };

        let max_size = lookup_parsed(&lookup, "DB_POOL_MAX", DEFAULT_POOL_MAX)?.max(1);
        let min_size = lookup_parsed(&lookup, "DB_POOL_MIN", DEFAULT_POOL_MIN)?.min(max_size);

        Ok(Self {
            host: required("DB_SERVER")?,
            port: lookup_parsed(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
            dbname: required("DB_DATABASE")?,
            user: required("DB_USER")?,
            // Passwords are taken verbatim; only blank values count as unset.
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            encrypt: lookup_bool(&lookup, "DB_ENCRYPT", false)?,
            max_size,
            min_size,
            connect_timeout: millis("DB_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT_MS)?,
            request_timeout: millis("DB_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_MS)?,
            idle_timeout: millis("DB_IDLE_TIMEOUT", DEFAULT_IDLE_TIMEOUT_MS)?,
            keepalive_interval: match lookup_trimmed(&lookup, "DB_KEEPALIVE_INTERVAL") {
                Some(raw) => match millis("DB_KEEPALIVE_INTERVAL", 0)? {
                    Duration::ZERO => {
                        return Err(ConfigError::Invalid {
                            name: "DB_KEEPALIVE_INTERVAL",
                            value: raw,
                        })
                    }
                    period => period,
                },
                None => DEFAULT_KEEPALIVE_INTERVAL,
            },
            max_retries: lookup_parsed(&lookup, "DB_MAX_RETRIES", DEFAULT_MAX_CONNECTION_RETRIES)?
                .max(1),
        })
    }

    /// Retry and keep-alive behaviour for the connection manager.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            retry_delay: CONNECTION_RETRY_DELAY,
            keepalive_interval: self.keepalive_interval,
        }
    }
}
