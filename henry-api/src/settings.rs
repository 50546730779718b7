//! Local Settings Loader
//!
//! Development machines keep their database credentials in
//! `local.settings.json`:
//!
//! ```json
//! { "Values": { "DB_SERVER": "localhost", "DB_USER": "henry" } }
//! ```
//!
//! Every scalar entry of `Values` is copied into the process environment
//! before configuration is read. Production never reads the file.
//!
//! Loading happens before tracing is installed, so nothing here logs. The
//! returned [`SettingsOutcome`] is reported with [`SettingsOutcome::log`]
//! once the subscriber is up.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::LOCAL_SETTINGS_FILE;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct LocalSettingsFile {
    #[serde(rename = "Values", default)]
    values: Option<BTreeMap<String, Value>>,
}

/// Scalar values read from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSettings {
    pub values: Vec<(String, String)>,
    /// Keys whose value was an object, array or null.
    pub skipped: Vec<String>,
}

/// What happened when local settings were loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    /// Running in production; the file was not consulted.
    SkippedProduction,
    /// No settings file at the path.
    NotFound,
    /// File applied.
    Loaded {
        /// Variable names that were set.
        applied: Vec<String>,
        /// Keys ignored because their value was not a scalar.
        skipped: Vec<String>,
    },
    /// The file exists but could not be read or parsed; startup continues
    /// with the system environment.
    Failed(String),
}

impl SettingsOutcome {
    /// Report the outcome. Call after tracing is initialized.
    pub fn log(&self) {
        match self {
            Self::SkippedProduction => {
                tracing::debug!("Production environment, {} not read", LOCAL_SETTINGS_FILE)
            }
            Self::NotFound => tracing::info!(
                "{} not found, using system environment variables",
                LOCAL_SETTINGS_FILE
            ),
            Self::Loaded { applied, skipped } => {
                for key in skipped {
                    tracing::warn!(%key, "Ignoring non-scalar local setting");
                }
                tracing::info!(count = applied.len(), "Loaded {}", LOCAL_SETTINGS_FILE);
            }
            Self::Failed(reason) => {
                tracing::warn!(error = %reason, "Failed to load {}", LOCAL_SETTINGS_FILE)
            }
        }
    }
}

/// Whether a `HENRY_ENVIRONMENT` value names production.
pub fn is_production_env(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|v| v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod"))
}

/// Read the `Values` map from a settings file. `Ok(None)` if the file does not exist.
pub fn read_settings(path: &Path) -> Result<Option<LocalSettings>, SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let file: LocalSettingsFile =
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut settings = LocalSettings::default();
    for (key, value) in file.values.unwrap_or_default() {
        match value {
            Value::String(s) => settings.values.push((key, s)),
            Value::Number(n) => settings.values.push((key, n.to_string())),
            Value::Bool(b) => settings.values.push((key, b.to_string())),
            _ => settings.skipped.push(key),
        }
    }

    Ok(Some(settings))
}

/// Apply a settings file to the process environment unless `production` is set.
pub fn load_settings_from(path: &Path, production: bool) -> Result<SettingsOutcome, SettingsError> {
    if production {
        return Ok(SettingsOutcome::SkippedProduction);
    }

    let Some(settings) = read_settings(path)? else {
        return Ok(SettingsOutcome::NotFound);
    };

    let applied = settings
        .values
        .into_iter()
        .map(|(key, value)| {
            std::env::set_var(&key, value);
            key
        })
        .collect();
    Ok(SettingsOutcome::Loaded {
        applied,
        skipped: settings.skipped,
    })
}

/// Load `local.settings.json` from the working directory into the environment.
///
/// Never fatal: a missing or malformed file yields an outcome to log and
/// startup continues with the system environment.
pub fn load_local_settings() -> SettingsOutcome {
    let production = is_production_env(std::env::var("HENRY_ENVIRONMENT").ok().as_deref());
    settings_outcome(Path::new(LOCAL_SETTINGS_FILE), production)
}

fn settings_outcome(path: &Path, production: bool) -> SettingsOutcome {
    load_settings_from(path, production).unwrap_or_else(|e| SettingsOutcome::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings_file(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_production_detection() {
        assert!(is_production_env(Some("production")));
        assert!(is_production_env(Some(" PROD ")));
        assert!(!is_production_env(Some("development")));
        assert!(!is_production_env(None));
    }

    #[test]
    fn test_read_values() -> Result<(), Box<dyn std::error::Error>> {
        let file = settings_file(
            r#"{"IsEncrypted": false, "Values": {"DB_SERVER": "localhost", "DB_PORT": 5433, "DB_ENCRYPT": true, "NESTED": {"a": 1}}}"#,
        )?;
        let settings = read_settings(file.path())?.unwrap_or_default();
        assert_eq!(
            settings.values,
            vec![
                ("DB_ENCRYPT".to_string(), "true".to_string()),
                ("DB_PORT".to_string(), "5433".to_string()),
                ("DB_SERVER".to_string(), "localhost".to_string()),
            ]
        );
        assert_eq!(settings.skipped, vec!["NESTED".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_values_object() -> Result<(), Box<dyn std::error::Error>> {
        let file = settings_file(r#"{"IsEncrypted": false}"#)?;
        assert_eq!(read_settings(file.path())?, Some(LocalSettings::default()));
        Ok(())
    }

    #[test]
    fn test_missing_file() -> Result<(), SettingsError> {
        let dir = std::env::temp_dir().join(format!("henry-missing-{}", uuid::Uuid::new_v4()));
        assert_eq!(read_settings(&dir.join(LOCAL_SETTINGS_FILE))?, None);
        Ok(())
    }

    #[test]
    fn test_malformed_file() -> std::io::Result<()> {
        let file = settings_file("{ not json")?;
        assert!(matches!(
            read_settings(file.path()),
            Err(SettingsError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_production_skips_file() -> Result<(), Box<dyn std::error::Error>> {
        let file = settings_file(r#"{"Values": {"HENRY_SETTINGS_TEST_SKIPPED": "1"}}"#)?;
        let outcome = load_settings_from(file.path(), true)?;
        assert_eq!(outcome, SettingsOutcome::SkippedProduction);
        assert!(std::env::var("HENRY_SETTINGS_TEST_SKIPPED").is_err());
        Ok(())
    }

    #[test]
    fn test_load_sets_environment() -> Result<(), Box<dyn std::error::Error>> {
        let file = settings_file(
            r#"{"Values": {"HENRY_SETTINGS_TEST_LOADED": "yes", "HENRY_SETTINGS_TEST_LIST": [1, 2]}}"#,
        )?;
        let outcome = load_settings_from(file.path(), false)?;
        assert_eq!(
            outcome,
            SettingsOutcome::Loaded {
                applied: vec!["HENRY_SETTINGS_TEST_LOADED".to_string()],
                skipped: vec!["HENRY_SETTINGS_TEST_LIST".to_string()],
            }
        );
        assert!(std::env::var("HENRY_SETTINGS_TEST_LIST").is_err());
        assert_eq!(std::env::var("HENRY_SETTINGS_TEST_LOADED")?, "yes");
        std::env::remove_var("HENRY_SETTINGS_TEST_LOADED");
        Ok(())
    }

    #[test]
    fn test_unreadable_file_reported_as_failed() -> std::io::Result<()> {
        let file = settings_file("[1, 2")?;
        match settings_outcome(file.path(), false) {
            SettingsOutcome::Failed(reason) => assert!(reason.contains("failed to parse")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        Ok(())
    }
}
