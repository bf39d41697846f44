//! Configuration for the wallet session monitor

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// General service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API server configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Wallet engine connection
    pub engine: EngineConfig,

    /// Staged security prompts
    #[serde(default)]
    pub security: SecurityConfig,

    /// Base node selection
    #[serde(default)]
    pub base_nodes: BaseNodesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// How often to poll the wallet engine (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/opt/wallet-monitor/data/session.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Whether to serve the HTTP API
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Listen address for the API server
    #[serde(default = "default_api_listen")]
    pub listen: String,

    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// API authentication token (required for all endpoints except health)
    /// If empty, authentication is disabled
    #[serde(default)]
    pub token: String,
}

fn default_enabled() -> bool {
    true
}

fn default_api_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8095
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen: default_api_listen(),
            port: default_api_port(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Wallet JSON-RPC URL
    pub wallet_rpc_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

fn default_rpc_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Show stage 3 (move funds to cold storage) prompts
    #[serde(default)]
    pub cold_wallet_stage_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaseNodesConfig {
    /// Network name, used to label peers reported by the engine
    #[serde(default = "default_network")]
    pub network: String,

    /// Seed list file with `name::pubkey::address` lines
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    /// Inline seed entries, same format as the seed file
    #[serde(default)]
    pub seeds: Vec<String>,
}

fn default_network() -> String {
    "esmeralda".to_string()
}

impl Default for BaseNodesConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            seed_file: None,
            seeds: Vec::new(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &str) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MONITOR_DB_PATH") {
            self.database.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MONITOR_API_PORT") {
            if let Ok(port) = val.parse() {
                self.api.port = port;
            }
        }
        if let Ok(val) = std::env::var("MONITOR_API_TOKEN") {
            self.api.token = val;
        }
        if let Ok(val) = std::env::var("MONITOR_LOG_LEVEL") {
            self.service.log_level = val;
        }
        if let Ok(val) = std::env::var("MONITOR_WALLET_RPC_URL") {
            self.engine.wallet_rpc_url = val;
        }
    }

    /// Seed list text from the seed file and inline entries
    pub fn seed_list(&self) -> anyhow::Result<String> {
        let mut content = match &self.base_nodes.seed_file {
            Some(path) => std::fs::read_to_string(path)?,
            None => String::new(),
        };

        for seed in &self.base_nodes.seeds {
            content.push('\n');
            content.push_str(seed);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [engine]
            wallet_rpc_url = "http://127.0.0.1:18143/json_rpc"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.poll_interval_secs, 5);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.api.port, 8095);
        assert!(config.api.token.is_empty());
        assert_eq!(config.engine.rpc_timeout_secs, 10);
        assert!(!config.security.cold_wallet_stage_enabled);
        assert_eq!(config.base_nodes.network, "esmeralda");
        assert!(config.seed_list().unwrap().is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [service]
            poll_interval_secs = 2
            log_level = "debug"

            [database]
            path = "/tmp/session.db"

            [api]
            enabled = false
            port = 9000
            token = "secret"

            [engine]
            wallet_rpc_url = "http://wallet:18143/json_rpc"

            [security]
            cold_wallet_stage_enabled = true

            [base_nodes]
            network = "nextnet"
            seeds = ["a::b::c"]
            "#,
        )
        .unwrap();

        assert_eq!(config.service.poll_interval_secs, 2);
        assert_eq!(config.database.path, PathBuf::from("/tmp/session.db"));
        assert!(!config.api.enabled);
        assert_eq!(config.api.token, "secret");
        assert!(config.security.cold_wallet_stage_enabled);
        assert_eq!(config.base_nodes.network, "nextnet");
        assert_eq!(config.seed_list().unwrap(), "\na::b::c");
    }

    #[test]
    fn test_missing_engine_section_is_an_error() {
        assert!(Config::from_toml("[service]\nlog_level = \"warn\"").is_err());
    }
}
