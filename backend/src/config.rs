//! Configuration management for the Wildlife Prediction Service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WPS_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather provider and cache configuration
    pub weather: WeatherConfig,

    /// Prediction cache configuration
    pub cache: CacheConfig,

    /// Background reconciliation configuration
    pub scheduler: SchedulerConfig,

    /// Catalog and training data
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one, predictions are kept in memory.
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// Weather API endpoint
    pub api_endpoint: String,

    /// Weather API key
    pub api_key: String,

    /// Per-call provider timeout in seconds
    pub timeout_secs: u64,

    /// Lifetime of a live observation in seconds
    pub cache_ttl_secs: u64,

    /// Lifetime of a synthesized fallback observation in seconds
    pub fallback_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Lifetime of a fast-cache prediction entry in seconds
    pub prediction_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Whether the background loops run at all
    pub enabled: bool,

    pub weather_interval_secs: u64,
    pub prediction_interval_secs: u64,
    pub store_sync_interval_secs: u64,
    pub retrain_interval_secs: u64,

    /// Run budget for a single job before it is abandoned
    pub job_timeout_secs: u64,

    /// Backoff applied to a key after a failed or abandoned job
    pub failure_backoff_secs: u64,

    /// Upper bound on concurrently running background jobs
    pub max_concurrent_jobs: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DataConfig {
    /// JSON catalog replacing the built-in parks and species
    pub catalog_path: Option<String>,

    /// CSV of labeled historical samples used for training
    pub training_csv_path: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WPS_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::build(environment, Self::env_overrides())
    }

    /// `WPS_<SECTION>__<KEY>` variables, e.g. `WPS_WEATHER__API_KEY`
    fn env_overrides() -> Environment {
        Environment::with_prefix("WPS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn build(environment: String, overrides: Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("weather.api_endpoint", "https://api.openweathermap.org/data/2.5")?
            .set_default("weather.api_key", "")?
            .set_default("weather.timeout_secs", 10)?
            .set_default("weather.cache_ttl_secs", 1800)?
            .set_default("weather.fallback_ttl_secs", 300)?
            .set_default("cache.prediction_ttl_secs", 3600)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.weather_interval_secs", 1800)?
            .set_default("scheduler.prediction_interval_secs", 3600)?
            .set_default("scheduler.store_sync_interval_secs", 7200)?
            .set_default("scheduler.retrain_interval_secs", 86400)?
            .set_default("scheduler.job_timeout_secs", 60)?
            .set_default("scheduler.failure_backoff_secs", 300)?
            .set_default("scheduler.max_concurrent_jobs", 8)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WPS_ prefix)
            .add_source(overrides)
            .build()?;

        config.try_deserialize()
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }
}

impl CacheConfig {
    pub fn prediction_ttl(&self) -> Duration {
        Duration::from_secs(self.prediction_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            weather: WeatherConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
            cache_ttl_secs: 1800,
            fallback_ttl_secs: 300,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prediction_ttl_secs: 3600,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weather_interval_secs: 1800,
            prediction_interval_secs: 3600,
            store_sync_interval_secs: 7200,
            retrain_interval_secs: 86400,
            job_timeout_secs: 60,
            failure_backoff_secs: 300,
            max_concurrent_jobs: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cadences() {
        let config = Config::default();
        assert_eq!(config.weather.cache_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(config.weather.fallback_ttl(), Duration::from_secs(5 * 60));
        assert_eq!(config.cache.prediction_ttl(), Duration::from_secs(60 * 60));
        assert_eq!(config.scheduler.store_sync_interval_secs, 2 * 60 * 60);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_env_overrides_use_single_underscore_prefix() {
        let vars: config::Map<String, String> = [
            ("WPS_WEATHER__API_KEY", "owm-key"),
            ("WPS_SCHEDULER__FAILURE_BACKOFF_SECS", "120"),
            ("WPS_DATA__CATALOG_PATH", "parks.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::build(
            "test".to_string(),
            Config::env_overrides().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.environment, "test");
        assert_eq!(config.weather.api_key, "owm-key");
        assert_eq!(config.scheduler.failure_backoff_secs, 120);
        assert_eq!(config.data.catalog_path.as_deref(), Some("parks.json"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_data_section_is_optional() {
        let config = Config::build(
            "test".to_string(),
            Config::env_overrides().source(Some(config::Map::new())),
        )
        .unwrap();
        assert!(config.data.catalog_path.is_none());
        assert!(config.data.training_csv_path.is_none());
    }
}
