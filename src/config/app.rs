//! Application configuration loaded from `config.toml` and the environment.
//!
//! Every field has a default, so a missing file is not an error. The
//! `DATABASE_URL` and `EXPENSIO_USER_ID` environment variables (usually set
//! through `.env`) override the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use crate::models::Currency;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Runtime settings for the binary and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `SeaORM` connection string for the record store
    pub database_url: String,
    /// User the local auth gate signs in as
    pub user_id: String,
    /// Currency shown before settings load or when none are stored
    pub default_currency: Currency,
    /// Per-resource deadline for the bulk load on session start
    pub fetch_timeout_ms: u64,
    /// Deadline for each store call made by a mutation
    pub mutation_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            user_id: "local-user".to_string(),
            default_currency: Currency::default(),
            fetch_timeout_ms: 8_000,
            mutation_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Bulk-load deadline as a [`Duration`].
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Mutation deadline as a [`Duration`].
    #[must_use]
    pub const fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database_url = url;
        }
        if let Some(user_id) = lookup("EXPENSIO_USER_ID").filter(|v| !v.is_empty()) {
            self.user_id = user_id;
        }
    }
}

/// Parses a configuration file.
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or is not valid TOML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads `config.toml` when present, falls back to defaults otherwise, then
/// applies environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let mut config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(DEFAULT_CONFIG_PATH)?
    } else {
        tracing::info!("No {DEFAULT_CONFIG_PATH} found, using defaults");
        AppConfig::default()
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            default_currency = "EUR"
            fetch_timeout_ms = 2500
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_currency, Currency::Eur);
        assert_eq!(config.fetch_timeout(), Duration::from_millis(2500));
        assert_eq!(config.mutation_timeout_ms, 10_000);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        let result: std::result::Result<AppConfig, _> = toml::from_str(r#"default_currency = "GBP""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("EXPENSIO_USER_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.database_url, "sqlite::memory:");
        // Empty values are ignored
        assert_eq!(config.user_id, "local-user");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
