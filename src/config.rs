use std::env;
use std::path::PathBuf;

use crate::error::StoreError;
use crate::service::WorkflowPolicy;
use crate::store::SledStore;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub storage: StorageConfig,
    pub workflow: WorkflowPolicy,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Reads `PETLAR_*` variables, after loading a `.env` file when one is present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment =
            AppEnvironment::parse(&lookup("PETLAR_ENV").unwrap_or_else(|| "development".into()));

        let path = lookup("PETLAR_DB_PATH").unwrap_or_else(|| "petlar.db".into());
        let temporary = match lookup("PETLAR_DB_TEMPORARY") {
            Some(raw) => parse_flag("PETLAR_DB_TEMPORARY", &raw)?,
            None => false,
        };

        let defaults = WorkflowPolicy::default();
        let require_active_owner = match lookup("PETLAR_REQUIRE_ACTIVE_OWNER") {
            Some(raw) => parse_flag("PETLAR_REQUIRE_ACTIVE_OWNER", &raw)?,
            None => defaults.require_active_owner,
        };
        let max_page_size = match lookup("PETLAR_MAX_PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "PETLAR_MAX_PAGE_SIZE",
                        value: raw,
                    });
                }
            },
            None => defaults.max_page_size,
        };

        let log_level = lookup("PETLAR_LOG_LEVEL").unwrap_or_else(|| "info".into());

        Ok(Self {
            environment,
            storage: StorageConfig {
                path: PathBuf::from(path),
                temporary,
            },
            workflow: WorkflowPolicy {
                require_active_owner,
                max_page_size,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where the sled database lives.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Throwaway database, removed on drop. `path` is ignored.
    pub temporary: bool,
}

impl StorageConfig {
    pub fn open(&self) -> Result<SledStore, StoreError> {
        if self.temporary {
            return SledStore::temporary();
        }
        SledStore::open(&self.path)
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be true or false, got '{value}'")]
    InvalidFlag { key: &'static str, value: String },
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.storage.path, PathBuf::from("petlar.db"));
        assert!(!config.storage.temporary);
        assert_eq!(config.workflow, WorkflowPolicy::default());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PETLAR_ENV", "Production"),
            ("PETLAR_DB_PATH", "/var/lib/petlar"),
            ("PETLAR_DB_TEMPORARY", "yes"),
            ("PETLAR_REQUIRE_ACTIVE_OWNER", "false"),
            ("PETLAR_MAX_PAGE_SIZE", "20"),
            ("PETLAR_LOG_LEVEL", "pet_adoption=debug"),
        ])
        .expect("config loads");

        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/petlar"));
        assert!(config.storage.temporary);
        assert!(!config.workflow.require_active_owner);
        assert_eq!(config.workflow.max_page_size, 20);
        assert_eq!(config.telemetry.log_level, "pet_adoption=debug");
    }

    #[test]
    fn rejects_malformed_values() {
        let err = config_from(&[("PETLAR_DB_TEMPORARY", "maybe")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidFlag {
                key: "PETLAR_DB_TEMPORARY",
                value: "maybe".into()
            }
        );

        for size in ["0", "-3", "lots"] {
            let err = config_from(&[("PETLAR_MAX_PAGE_SIZE", size)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "PETLAR_MAX_PAGE_SIZE", .. }));
        }
    }

    #[test]
    fn temporary_storage_opens() {
        let storage = StorageConfig {
            path: PathBuf::from("unused"),
            temporary: true,
        };
        assert!(storage.open().is_ok());
    }
}
