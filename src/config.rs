use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 8;
const DEFAULT_RESERVATION_MAX_AGE_HOURS: i64 = 72;

/// Engine configuration, loaded from layered config files plus
/// `APP_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Database connection URL (`sqlite://...` or `postgres://...`).
    pub database_url: String,

    /// Deployment environment name ("development", "test", "production").
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Run pending migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Default age threshold for the reservation cleanup sweep.
    #[serde(default = "default_reservation_max_age_hours")]
    pub reservation_max_age_hours: i64,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_db_connect_timeout_secs() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_SECS
}

fn default_db_idle_timeout_secs() -> u64 {
    DEFAULT_DB_IDLE_TIMEOUT_SECS
}

fn default_db_acquire_timeout_secs() -> u64 {
    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS
}

fn default_reservation_max_age_hours() -> i64 {
    DEFAULT_RESERVATION_MAX_AGE_HOURS
}

impl AppConfig {
    /// Builds a config directly, bypassing file/env layering. Used by tests
    /// and embedding hosts that already resolved their settings.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            auto_migrate: false,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            db_idle_timeout_secs: DEFAULT_DB_IDLE_TIMEOUT_SECS,
            db_acquire_timeout_secs: DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
            reservation_max_age_hours: DEFAULT_RESERVATION_MAX_AGE_HOURS,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads configuration from `config/default`, `config/<APP_ENV>`, and the
/// `APP_` environment namespace, in increasing precedence.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let settings = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_override_option("environment", Some(run_env))?
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_pool_defaults() {
        let cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(cfg.reservation_max_age_hours, 72);
        assert!(!cfg.is_production());
    }
}
