//! Centralized configuration (environment variables + defaults).
//!
//! Read once at startup; `.env` is honoured. Nothing is reloaded afterwards.

use crate::error::{RepositoryError, RepositoryResult};
use crate::infra::logging::LogFormat;
use crate::storage::dialect::DialectKind;
use crate::storage::sql::PoolSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";

/// What to do with the catalog's tables at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitTables {
    #[default]
    Off,
    /// `CREATE TABLE IF NOT EXISTS` for every catalog table.
    Create,
    /// Drop, then create.
    Recreate,
}

impl FromStr for InitTables {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "off" | "no" => Ok(InitTables::Off),
            "true" | "1" | "on" | "yes" | "create" => Ok(InitTables::Create),
            "drop" | "recreate" => Ok(InitTables::Recreate),
            other => Err(RepositoryError::Config(format!(
                "INIT_TABLES must be true, false or drop, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// sqlx connection URL (required).
    pub database_url: String,
    /// Engine, from `DATABASE_ENGINE` or the URL scheme.
    pub engine: DialectKind,
    /// Key strategy name: `time`, `store`, or a registered custom generator
    /// (the binaries ship `sequence`).
    pub key_generator: String,
    pub table_prefix: String,
    pub pool: PoolSettings,
    /// Table definitions document.
    pub schema_path: Option<PathBuf>,
    pub init_tables: InitTables,
    pub api_addr: String,
    pub log_format: LogFormat,
}

impl Settings {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> RepositoryResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> RepositoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| RepositoryError::Config("DATABASE_URL must be set".into()))?;
        let engine = match get("DATABASE_ENGINE") {
            Some(name) => name.parse()?,
            None => DialectKind::from_url(&database_url)?,
        };

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                defaults.max_connections,
            )?
            .max(1),
            min_connections: defaults.min_connections,
            acquire_timeout: Duration::from_secs(parse_or(
                get("DATABASE_ACQUIRE_TIMEOUT_SECS"),
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
        };

        let table_prefix = get("TABLE_PREFIX").unwrap_or_default();
        if !table_prefix.is_empty()
            && !table_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RepositoryError::Config(format!(
                "TABLE_PREFIX '{table_prefix}' may only contain letters, digits and '_'"
            )));
        }

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse().map_err(RepositoryError::Config)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            database_url,
            engine,
            key_generator: get("KEY_GENERATOR").unwrap_or_else(|| "time".to_string()),
            table_prefix,
            pool,
            schema_path: get("REPOSITORY_SCHEMA").map(PathBuf::from),
            init_tables: get("INIT_TABLES").unwrap_or_default().parse()?,
            api_addr: get("API_ADDR").unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            log_format,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> RepositoryResult<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| RepositoryError::Config(format!("{key} must be a number, got '{v}'"))),
        None => Ok(default),
    }
}
