use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::{providers, validation};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub ledger: LedgerSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single request, commit included
    pub request_timeout_secs: u64,
}

/// PostgreSQL settings; the in-memory store is used when `url` is unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

/// Ledger engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Decimal places of the minor currency unit (2 = cents)
    pub minor_unit_scale: u32,
    /// Allowed drift of a split table from 100%
    pub split_tolerance: Decimal,
    /// Attempts for a transient commit failure, first attempt included
    pub commit_max_attempts: u32,
    /// Initial backoff between commit attempts, doubled per retry
    pub commit_backoff_ms: u64,
    /// YAML file of contracts loaded into the in-memory store at startup
    pub seed_contracts: Option<PathBuf>,
    /// Seconds between reconciliation passes over the staged store; 0 disables
    pub reconcile_interval_secs: u64,
    /// Age a staging must reach before reconciliation touches it
    pub reconcile_grace_secs: u64,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_secs: 30,
            run_migrations: true,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            minor_unit_scale: 2,
            split_tolerance: Decimal::new(1, 2),
            commit_max_attempts: 3,
            commit_backoff_ms: 100,
            seed_contracts: None,
            reconcile_interval_secs: 60,
            reconcile_grace_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file is missing or unreadable, when a value
    /// cannot be parsed, or when the merged configuration fails validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config: EngineConfig = providers::figment(path)?.extract()?;
        validation::validate(&config)?;
        tracing::debug!(
            file = path.unwrap_or("<none>"),
            database = config.database.url.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Whether the engine should run against PostgreSQL
    pub fn uses_database(&self) -> bool {
        self.database.url.is_some()
    }
}
