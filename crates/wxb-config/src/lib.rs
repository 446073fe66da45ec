use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV: &str = "WXBRIDGE_CONFIG";
pub const PROVIDER_TOKEN_ENV: &str = "WXBRIDGE_PROVIDER_TOKEN";
pub const AGGREGATOR_API_KEY_ENV: &str = "WXBRIDGE_AGGREGATOR_API_KEY";

pub const DEFAULT_REST_URL: &str = "https://swd.weatherflow.com/swd/rest";
pub const DEFAULT_WS_URL: &str = "wss://ws.weatherflow.com/swd/data";
pub const DEFAULT_PUSH_URL: &str = "https://stations.windy.com/pws/update";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub token: Option<String>,
    pub station_id: Option<i64>,
    pub device_id: Option<i64>,
    pub rest_url: Option<String>,
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub api_key: Option<String>,
    /// Station index within the aggregator account
    pub station_id: Option<u32>,
    pub url: Option<String>,
    pub throttle_secs: Option<i64>,
    pub imperial: Option<bool>,
    pub share_option: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub reconnect: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub provider: Option<ProviderConfig>,
    pub aggregator: Option<AggregatorConfig>,
    pub store: Option<StoreConfig>,
    pub session: Option<SessionConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing required setting {0}")]
    Missing(&'static str),
}

impl AppConfig {
    /// Load configuration from the WXBRIDGE_CONFIG path (TOML) if present,
    /// then apply secret overrides from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "wxbridge.toml".to_string());
        let mut cfg = Self::from_path(&path)?;
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(PROVIDER_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.provider.get_or_insert_with(Default::default).token = Some(token);
        }
        if let Some(key) = lookup(AGGREGATOR_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.aggregator.get_or_insert_with(Default::default).api_key = Some(key);
        }
    }

    /// Settings needed to talk to the provider
    pub fn validate_provider(&self) -> Result<(), ConfigError> {
        let provider = self.provider.as_ref();
        if provider.and_then(|p| p.token.as_deref()).map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("provider.token"));
        }
        if provider.and_then(|p| p.station_id).is_none() {
            return Err(ConfigError::Missing("provider.station_id"));
        }
        if provider.and_then(|p| p.device_id).is_none() {
            return Err(ConfigError::Missing("provider.device_id"));
        }
        Ok(())
    }

    /// Settings needed by the live bridge
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_provider()?;
        if self
            .aggregator
            .as_ref()
            .and_then(|a| a.api_key.as_deref())
            .map_or(true, str::is_empty)
        {
            return Err(ConfigError::Missing("aggregator.api_key"));
        }
        Ok(())
    }

    pub fn provider_token(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.token.clone())
            .unwrap_or_default()
    }

    pub fn station_id(&self) -> i64 {
        self.provider.as_ref().and_then(|p| p.station_id).unwrap_or_default()
    }

    pub fn device_id(&self) -> i64 {
        self.provider.as_ref().and_then(|p| p.device_id).unwrap_or_default()
    }

    pub fn rest_url(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.rest_url.clone())
            .unwrap_or_else(|| DEFAULT_REST_URL.to_string())
    }

    pub fn ws_url(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.ws_url.clone())
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string())
    }

    pub fn aggregator_api_key(&self) -> String {
        self.aggregator
            .as_ref()
            .and_then(|a| a.api_key.clone())
            .unwrap_or_default()
    }

    pub fn aggregator_station(&self) -> u32 {
        self.aggregator.as_ref().and_then(|a| a.station_id).unwrap_or_default()
    }

    pub fn aggregator_url(&self) -> String {
        self.aggregator
            .as_ref()
            .and_then(|a| a.url.clone())
            .unwrap_or_else(|| DEFAULT_PUSH_URL.to_string())
    }

    /// Minimum seconds between forwarded observations (default 300)
    pub fn throttle_secs(&self) -> i64 {
        self.aggregator
            .as_ref()
            .and_then(|a| a.throttle_secs)
            .unwrap_or(300)
    }

    pub fn imperial(&self) -> bool {
        self.aggregator.as_ref().and_then(|a| a.imperial).unwrap_or(false)
    }

    pub fn share_option(&self) -> String {
        self.aggregator
            .as_ref()
            .and_then(|a| a.share_option.clone())
            .unwrap_or_else(|| "Open".to_string())
    }

    /// SQLite database path (default tempest.db)
    pub fn store_path(&self) -> String {
        self.store
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| "tempest.db".to_string())
    }

    pub fn max_attempts(&self) -> u32 {
        self.session.as_ref().and_then(|s| s.max_attempts).unwrap_or(5)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.session.as_ref().and_then(|s| s.backoff_ms).unwrap_or(1000))
    }

    pub fn reconnect(&self) -> bool {
        self.session.as_ref().and_then(|s| s.reconnect).unwrap_or(true)
    }
}
