//! Health check types

use henry_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: Timestamp,
    pub database: DatabaseStatus,
}

/// Database section of the health response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Server time and version reported by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub server_time: Timestamp,
    pub version: String,
}

/// Details reported by `GET /health/db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDetails {
    pub server_time: Timestamp,
    pub database_name: String,
    pub server_name: Option<String>,
    pub version: String,
}

/// Connectivity status for `GET /health/db`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbConnectivity {
    Connected,
    Disconnected,
}

/// Response body of `GET /health/db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbHealthResponse {
    pub status: DbConnectivity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DatabaseDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body of `GET /health/live`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Response body of `GET /test-db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_database_status_uses_camel_case() -> Result<(), serde_json::Error> {
        let status = DatabaseStatus {
            connected: true,
            server_time: Some(Utc::now()),
            version: Some("PostgreSQL 16".to_string()),
            error: None,
        };
        let json = serde_json::to_value(&status)?;
        assert!(json.get("serverTime").is_some());
        assert!(json.get("error").is_none());
        Ok(())
    }
}
