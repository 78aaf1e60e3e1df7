//! Configuration loader
//!
//! Loads suite configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from a TOML file
//! 3. Probes multiple paths for config files
//!
//! ## Environment Variables
//! - `DBTUNE_DATABASES`: comma-separated `alias=path` pairs (required)
//! - `DBTUNE_POOL_MIN_CONNECTIONS`: pool minimum (optional)
//! - `DBTUNE_POOL_MAX_CONNECTIONS`: pool maximum (optional)
//! - `DBTUNE_HEALTH_CHECK_INTERVAL`: health-check period in seconds
//!   (optional)
//!
//! Thresholds not covered by a variable keep their defaults; a file is
//! the place to tune the full set.
//!
//! ## File Locations
//! The loader probes `./dbtune.toml` then `./config.toml`.

use std::path::{Path, PathBuf};

use dbtune_domain::config::{DatabaseConfig, SuiteConfig};
use dbtune_domain::{OptimizerError, Result};
use tracing::{debug, info};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `OptimizerError::Config` when neither the environment nor a
/// probed file yields a valid configuration.
pub fn load() -> Result<SuiteConfig> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(err) => {
            debug!(error = ?err, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// # Errors
/// Returns `OptimizerError::Config` when `DBTUNE_DATABASES` is missing
/// or malformed, or an override variable has an invalid value.
pub fn load_from_env() -> Result<SuiteConfig> {
    let databases = parse_databases(&env_var("DBTUNE_DATABASES")?)?;

    let mut config = SuiteConfig { databases, ..SuiteConfig::default() };
    if let Some(min) = env_parse::<u32>("DBTUNE_POOL_MIN_CONNECTIONS")? {
        config.pool.min_connections = min;
    }
    if let Some(max) = env_parse::<u32>("DBTUNE_POOL_MAX_CONNECTIONS")? {
        config.pool.max_connections = max;
    }
    if let Some(interval) = env_parse::<u64>("DBTUNE_HEALTH_CHECK_INTERVAL")? {
        config.pool.health_check_interval_secs = interval;
    }
    Ok(config)
}

/// Load configuration from a TOML file.
///
/// If `path` is `None`, probes `./dbtune.toml` then `./config.toml`.
///
/// # Errors
/// Returns `OptimizerError::Config` when no file is found or the file
/// does not parse.
pub fn load_from_file(path: Option<&Path>) -> Result<SuiteConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths().ok_or_else(|| {
            OptimizerError::Config("no configuration file found (tried dbtune.toml, config.toml)".into())
        })?,
    };

    let text = std::fs::read_to_string(&path).map_err(|err| {
        OptimizerError::Config(format!("cannot read {}: {err}", path.display()))
    })?;
    let config: SuiteConfig = toml::from_str(&text).map_err(|err| {
        OptimizerError::Config(format!("cannot parse {}: {err}", path.display()))
    })?;
    if config.databases.is_empty() {
        return Err(OptimizerError::Config(format!(
            "{} configures no databases",
            path.display()
        )));
    }
    info!(path = %path.display(), "configuration loaded from file");
    Ok(config)
}

/// Parse `alias=path,alias=path` database descriptors.
fn parse_databases(value: &str) -> Result<Vec<DatabaseConfig>> {
    let mut databases = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (alias, path) = entry.split_once('=').ok_or_else(|| {
            OptimizerError::Config(format!("database entry '{entry}' is not alias=path"))
        })?;
        if alias.trim().is_empty() || path.trim().is_empty() {
            return Err(OptimizerError::Config(format!("database entry '{entry}' is incomplete")));
        }
        databases.push(DatabaseConfig { alias: alias.trim().to_string(), path: path.trim().to_string() });
    }
    if databases.is_empty() {
        return Err(OptimizerError::Config("DBTUNE_DATABASES configures no databases".into()));
    }
    Ok(databases)
}

fn probe_config_paths() -> Option<PathBuf> {
    ["dbtune.toml", "config.toml"].into_iter().map(PathBuf::from).find(|p| p.is_file())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| OptimizerError::Config(format!("environment variable {name} not set")))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| OptimizerError::Config(format!("invalid value for {name}: '{value}'"))),
        Err(_) => Ok(None),
    }
}
