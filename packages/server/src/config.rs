use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use job_sources::{RegistryConfig, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};

/// Every 15 minutes, on the minute (tokio-cron-scheduler uses a seconds field)
pub const DEFAULT_SAVED_SEARCH_SCHEDULE: &str = "0 */15 * * * *";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub source_timeout: Duration,
    pub search_default_limit: usize,
    pub search_max_limit: usize,
    pub saved_search_schedule: String,
    pub disabled_sources: Vec<String>,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://jobs.db".to_string(),
            port: 8080,
            source_timeout: Duration::from_secs(30),
            search_default_limit: DEFAULT_SEARCH_LIMIT,
            search_max_limit: MAX_SEARCH_LIMIT,
            saved_search_schedule: DEFAULT_SAVED_SEARCH_SCHEDULE.to_string(),
            disabled_sources: Vec::new(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: parse_var("PORT", defaults.port)?,
            source_timeout: Duration::from_secs(parse_var(
                "SOURCE_TIMEOUT_SECS",
                defaults.source_timeout.as_secs(),
            )?),
            search_default_limit: parse_var("SEARCH_DEFAULT_LIMIT", defaults.search_default_limit)?,
            search_max_limit: parse_var("SEARCH_MAX_LIMIT", defaults.search_max_limit)?,
            saved_search_schedule: env::var("SAVED_SEARCH_SCHEDULE")
                .unwrap_or(defaults.saved_search_schedule),
            disabled_sources: list_var("DISABLED_SOURCES"),
            allowed_origins: list_var("ALLOWED_ORIGINS"),
        };

        if config.search_default_limit == 0 || config.search_max_limit == 0 {
            anyhow::bail!("SEARCH_DEFAULT_LIMIT and SEARCH_MAX_LIMIT must be positive");
        }

        Ok(config)
    }

    /// Registry knobs derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new().with_source_timeout(self.source_timeout)
    }

    /// Resolve a requested page size against the configured default and cap
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.search_default_limit)
            .clamp(1, self.search_max_limit)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

fn list_var(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit_uses_default_and_cap() {
        let config = Config::default();
        assert_eq!(config.clamp_limit(None), 50);
        assert_eq!(config.clamp_limit(Some(500)), 100);
        assert_eq!(config.clamp_limit(Some(0)), 1);
    }

    #[test]
    fn test_registry_config_carries_timeout() {
        let config = Config {
            source_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        assert_eq!(config.registry_config().source_timeout, Duration::from_secs(5));
    }
}
