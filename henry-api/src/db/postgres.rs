//! PostgreSQL pool backend built on deadpool-postgres.

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, SslMode, Timeouts,
};
use std::sync::Arc;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info};

use crate::constants::{POOL_RECYCLE_TIMEOUT, PROBE_QUERY};
use crate::db::config::DbConfig;
use crate::db::manager::{ConnectionError, PoolBackend};

const APPLICATION_NAME: &str = "henry-api";

/// Opens deadpool pools from a [`DbConfig`].
#[derive(Debug, Clone)]
pub struct PgPoolBackend {
    config: DbConfig,
}

impl PgPoolBackend {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Translate the database configuration into a deadpool config.
    pub fn pool_config(&self) -> Config {
        let c = &self.config;
        let mut cfg = Config::new();
        cfg.host = Some(c.host.clone());
        cfg.port = Some(c.port);
        cfg.dbname = Some(c.dbname.clone());
        cfg.user = Some(c.user.clone());
        cfg.password = Some(c.password.clone());
        cfg.application_name = Some(APPLICATION_NAME.to_string());
        cfg.connect_timeout = Some(c.connect_timeout);
        cfg.keepalives = Some(true);
        cfg.options = Some(format!(
            "-c statement_timeout={}",
            c.request_timeout.as_millis()
        ));
        cfg.ssl_mode = Some(if c.encrypt {
            SslMode::Require
        } else {
            SslMode::Disable
        });

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(c.max_size);
        pool.timeouts = Timeouts {
            wait: Some(c.request_timeout),
            create: Some(c.connect_timeout),
            recycle: Some(POOL_RECYCLE_TIMEOUT),
        };
        cfg.pool = Some(pool);

        cfg
    }

    fn create_pool(&self) -> Result<Pool, ConnectionError> {
        let cfg = self.pool_config();
        let pool = if self.config.encrypt {
            cfg.create_pool(Some(Runtime::Tokio1), tls_connector()?)
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        };
        pool.map_err(|e| ConnectionError::open(format!("Failed to create pool: {}", e)))
    }
}

/// TLS connector trusting the bundled web PKI roots.
fn tls_connector() -> Result<MakeRustlsConnect, ConnectionError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ConnectionError::open(format!("Invalid TLS configuration: {}", e)))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

#[async_trait]
impl PoolBackend for PgPoolBackend {
    type Pool = Pool;

    async fn open(&self) -> Result<Pool, ConnectionError> {
        let pool = self.create_pool()?;

        // Warm up the minimum number of connections; holding them forces
        // distinct connections to be created.
        let mut warm = Vec::with_capacity(self.config.min_size.max(1));
        for _ in 0..self.config.min_size.max(1) {
            let conn = pool
                .get()
                .await
                .map_err(|e| ConnectionError::open(e.to_string()))?;
            warm.push(conn);
        }

        if let Some(conn) = warm.first() {
            conn.simple_query(PROBE_QUERY)
                .await
                .map_err(|e| ConnectionError::open(e.to_string()))?;
        }
        drop(warm);

        info!(
            host = %self.config.host,
            database = %self.config.dbname,
            max_size = self.config.max_size,
            min_size = self.config.min_size,
            encrypt = self.config.encrypt,
            "Database pool opened"
        );
        Ok(pool)
    }

    async fn probe(&self, pool: &Pool) -> Result<(), ConnectionError> {
        let conn = pool
            .get()
            .await
            .map_err(|e| ConnectionError::probe(e.to_string()))?;
        conn.simple_query(PROBE_QUERY)
            .await
            .map_err(|e| ConnectionError::probe(e.to_string()))?;
        Ok(())
    }

    fn evict_idle(&self, pool: &Pool) {
        let idle_timeout = self.config.idle_timeout;
        let result = pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
        if !result.removed.is_empty() {
            debug!(evicted = result.removed.len(), "Evicted idle database connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(encrypt: bool) -> DbConfig {
        DbConfig {
            host: "db.internal".to_string(),
            port: 5432,
            dbname: "henry".to_string(),
            user: "henry_app".to_string(),
            password: "s3cret".to_string(),
            encrypt,
            max_size: 10,
            min_size: 2,
            connect_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(900),
            keepalive_interval: Duration::from_secs(240),
            max_retries: 3,
        }
    }

    #[test]
    fn test_pool_config_mapping() {
        let cfg = PgPoolBackend::new(config(false)).pool_config();

        assert_eq!(cfg.host.as_deref(), Some("db.internal"));
        assert_eq!(cfg.dbname.as_deref(), Some("henry"));
        assert_eq!(cfg.options.as_deref(), Some("-c statement_timeout=30000"));
        assert!(matches!(cfg.ssl_mode, Some(SslMode::Disable)));

        let pool = cfg.pool.unwrap();
        assert_eq!(pool.max_size, 10);
        assert_eq!(pool.timeouts.wait, Some(Duration::from_secs(30)));
        assert_eq!(pool.timeouts.create, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_encrypt_requires_tls() {
        let cfg = PgPoolBackend::new(config(true)).pool_config();
        assert!(matches!(cfg.ssl_mode, Some(SslMode::Require)));
    }

    #[test]
    fn test_tls_connector_builds() {
        assert!(tls_connector().is_ok());
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        // Building the pool does not connect; only `open` does.
        let backend = PgPoolBackend::new(config(false));
        assert!(backend.create_pool().is_ok());
    }
}
