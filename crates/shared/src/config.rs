//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Datastore access configuration.
    #[serde(default)]
    pub datastore: DatastoreConfig,
    /// Reference data cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Payment rules.
    #[serde(default)]
    pub payments: PaymentsConfig,
    /// Dashboard defaults.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a whole HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Datastore access configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DatastoreConfig {
    /// Rows requested per page when draining a query.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Timeout for one datastore call group, in seconds.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_page_size() -> u32 {
    1000
}

fn default_store_timeout() -> u64 {
    20
}

/// Reference data cache configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached query results, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Maximum number of cached query results.
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    /// Drop cached results of a table after every write to it.
    #[serde(default = "default_invalidate_on_write")]
    pub invalidate_on_write: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
            invalidate_on_write: default_invalidate_on_write(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    600 // 10 minutes
}

fn default_cache_capacity() -> u64 {
    256
}

fn default_invalidate_on_write() -> bool {
    true
}

/// Payment rules.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaymentsConfig {
    /// How many days ahead of today a payment date may be set.
    #[serde(default = "default_max_days_ahead")]
    pub max_days_ahead: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            max_days_ahead: default_max_days_ahead(),
        }
    }
}

fn default_max_days_ahead() -> i64 {
    7
}

/// Dashboard defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DashboardConfig {
    /// Number of trailing months in the debt evolution series.
    #[serde(default = "default_evolution_months")]
    pub evolution_months: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            evolution_months: default_evolution_months(),
        }
    }
}

fn default_evolution_months() -> u32 {
    6
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("OBRAFIN").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .expect("config should deserialize")
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let cfg = from_toml(
            r#"
            [database]
            url = "postgres://localhost/obrafin"
            "#,
        );

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.datastore.page_size, 1000);
        assert_eq!(cfg.datastore.timeout_secs, 20);
        assert_eq!(cfg.cache.ttl_secs, 600);
        assert!(cfg.cache.invalidate_on_write);
        assert_eq!(cfg.payments.max_days_ahead, 7);
        assert_eq!(cfg.dashboard.evolution_months, 6);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let cfg = from_toml(
            r#"
            [database]
            url = "postgres://localhost/obrafin"
            max_connections = 4

            [cache]
            ttl_secs = 900
            invalidate_on_write = false

            [datastore]
            page_size = 250
            "#,
        );

        assert_eq!(cfg.database.max_connections, 4);
        assert_eq!(cfg.cache.ttl_secs, 900);
        assert!(!cfg.cache.invalidate_on_write);
        assert_eq!(cfg.datastore.page_size, 250);
    }
}
