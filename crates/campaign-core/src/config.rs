//! Configuration management for the campaign control loop.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub tips: TipsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisConfig {
    /// Leases fall back to in-process locking when unset.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TipsConfig {
    /// Base URL of the creative tips service.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_tips_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tips_timeout_secs() -> u64 {
    20
}

impl Default for TipsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_tips_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| Error::Config {
                    message: "DATABASE_URL environment variable not set".to_string(),
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_connections),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok(),
            },
            tips: TipsConfig {
                base_url: env::var("TIPS_API_URL").ok(),
                api_key: env::var("TIPS_API_KEY").ok(),
                timeout_secs: env::var("TIPS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_tips_timeout_secs),
            },
        })
    }

    /// Load configuration from an optional `adpilot.toml` layered under
    /// `ADPILOT__*` environment variables (e.g. `ADPILOT__DATABASE__URL`).
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("adpilot").required(false))
            .add_source(config::Environment::with_prefix("ADPILOT").separator("__"))
            .build()?;

        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::Config {
                message: "database.url must not be empty".to_string(),
            });
        }
        if let Some(ref base_url) = self.tips.base_url {
            url::Url::parse(base_url).map_err(|e| Error::Config {
                message: format!("tips.base_url is not a valid URL: {}", e),
            })?;
        }
        Ok(())
    }

    /// Load configuration for testing (with defaults).
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/adpilot_test".to_string(),
                max_connections: 2,
            },
            redis: RedisConfig::default(),
            tips: TipsConfig::default(),
        }
    }
}
