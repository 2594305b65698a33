use alloy::primitives::Address;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::keeper::{CoordinatorSettings, IndeterminatePolicy};

/// Factory the keeper watches when none is configured.
pub const DEFAULT_FACTORY: &str = "0x1c6AbAaf5b8a410Ae89d30C84a0123173DaabfA3";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub keeper: KeeperConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub general: General,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// RPC endpoint for reads and transactions (env RPC_URL)
    #[serde(default)]
    pub rpc_url: String,
    /// WebSocket endpoint for the log subscription; falls back to rpc_url (env WS_URL)
    #[serde(default)]
    pub ws_url: String,
    #[serde(default = "default_factory")]
    pub factory_address: String,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeeperConfig {
    /// Hex private key of the keeper (env PRIVATE_KEY). Never commit it.
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub await_resolve_receipt: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// env OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub on_indeterminate: IndeterminatePolicy,
    #[serde(default = "default_max_poll")]
    pub max_poll_secs: u64,
    #[serde(default)]
    pub evict_terminal: bool,
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_factory() -> String {
    DEFAULT_FACTORY.to_string()
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_max_failures() -> u32 {
    10
}
fn default_oracle_url() -> String {
    "https://llm-gateway.heurist.xyz".to_string()
}
fn default_model() -> String {
    "mistralai/mixtral-8x7b-instruct".to_string()
}
fn default_max_tokens() -> u32 {
    1
}
fn default_oracle_timeout() -> u64 {
    30
}
fn default_max_poll() -> u64 {
    60
}
fn default_summary_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            ws_url: String::new(),
            factory_address: default_factory(),
            reconnect_delay_secs: default_reconnect_delay(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            on_indeterminate: IndeterminatePolicy::default(),
            max_poll_secs: default_max_poll(),
            evict_terminal: false,
            summary_interval_secs: default_summary_interval(),
        }
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load from a TOML file, then overlay secrets from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Defaults plus environment, when there is no config file.
    pub fn from_env() -> Self {
        Config::default().with_env(|key| std::env::var(key).ok())
    }

    /// Environment values win over file values when set and non-empty.
    fn with_env<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Some(url) = var("WS_URL") {
            self.chain.ws_url = url;
        }
        if let Some(address) = var("FACTORY_ADDRESS") {
            self.chain.factory_address = address;
        }
        if let Some(key) = var("PRIVATE_KEY") {
            self.keeper.private_key = key;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.oracle.api_key = key;
        }
        self
    }

    pub fn factory_address(&self) -> Result<Address, ConfigError> {
        Address::from_str(self.chain.factory_address.trim()).map_err(|e| ConfigError::Invalid {
            field: "chain.factory_address",
            reason: e.to_string(),
        })
    }

    /// RPC endpoint, required.
    pub fn rpc_url(&self) -> Result<&str, ConfigError> {
        match self.chain.rpc_url.trim() {
            "" => Err(ConfigError::Missing("chain.rpc_url (or RPC_URL)")),
            url => Ok(url),
        }
    }

    /// Subscription endpoint: `ws_url`, else `rpc_url`.
    pub fn ws_url(&self) -> Result<&str, ConfigError> {
        match self.chain.ws_url.trim() {
            "" => self.rpc_url(),
            url => Ok(url),
        }
    }

    pub fn private_key(&self) -> Result<&str, ConfigError> {
        match self.keeper.private_key.trim() {
            "" => Err(ConfigError::Missing("keeper.private_key (or PRIVATE_KEY)")),
            key => Ok(key),
        }
    }

    /// Everything the keeper needs to start, checked up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc_url()?;
        self.private_key()?;
        self.factory_address()?;
        if self.resolution.max_poll_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "resolution.max_poll_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            indeterminate: self.resolution.on_indeterminate,
            max_poll: Duration::from_secs(self.resolution.max_poll_secs),
            evict_terminal: self.resolution.evict_terminal,
        }
    }
}
