//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting engine configuration.
    #[serde(default)]
    pub posting: PostingConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
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

/// Transaction isolation level used by the durable committer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationSetting {
    /// Row locks alone serialize overlapping postings.
    #[default]
    ReadCommitted,
    /// Conflicting row versions surface as serialization failures.
    RepeatableRead,
    /// Full serializable isolation.
    Serializable,
}

/// Posting engine configuration: retry policy and committer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Total attempts (first try included) for a contended commit.
    pub max_attempts: u32,
    /// Base backoff delay; attempt `n` waits `base * 2^n`.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,
    /// Maximum random jitter added to each backoff delay.
    pub jitter_ms: u64,
    /// Isolation level for the commit transaction.
    pub isolation: IsolationSetting,
    /// Optional `lock_timeout` applied inside the commit transaction.
    pub lock_timeout_ms: Option<u64>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
            jitter_ms: 25,
            isolation: IsolationSetting::default(),
            lock_timeout_ms: None,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether cache invalidation is performed at all.
    pub enabled: bool,
    /// Maximum number of entries in the local cache.
    pub max_capacity: u64,
    /// Time-to-live in seconds for each entry.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 10_000,
            ttl_secs: 300, // 5 minutes
        }
    }
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
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
