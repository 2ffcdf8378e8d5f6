use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Hitbloq id of the player; rank info and "around me" need it
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub friends: Vec<u64>,
    #[serde(default = "default_pool_cache_ttl_secs")]
    pub pool_cache_ttl_secs: u64,
}

fn default_api_url() -> String {
    "https://hitbloq.com".to_string()
}

fn default_pool_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_id: None,
            friends: Vec::new(),
            pool_cache_ttl_secs: default_pool_cache_ttl_secs(),
        }
    }
}

impl Settings {
    /// Load from `$HITBLOQ_CONFIG` (default `config.toml`, optional) and `HITBLOQ__*` variables
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("HITBLOQ_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load(&config_path)
    }

    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("HITBLOQ")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("friends")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        tracing::debug!(
            api_url = %settings.api_url,
            user_id = ?settings.user_id,
            friends = settings.friends.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::Configuration("api_url is required".to_string()));
        }
        if !self.api_url.starts_with("http") {
            return Err(ConfigError::Configuration(
                "api_url must be a valid HTTP(S) URL".to_string(),
            ));
        }
        if self.pool_cache_ttl_secs == 0 {
            return Err(ConfigError::Configuration(
                "pool_cache_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pool_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pool_cache_ttl_secs)
    }
}
