//! Configuration management
//!
//! Defaults, overridden by an optional TOML file and then by `SIPDESK__*` environment
//! variables (`SIPDESK__SERVER__PORT=9000`).

use crate::domain::auth::ApiKey;
use ::config::{ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SIPDESK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sipdesk.toml";
const ENV_PREFIX: &str = "SIPDESK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sip: SipConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    /// JSON-RPC endpoint of the SIP process
    pub rpc_url: String,
    /// Budget for a participant request that carries no deadline
    pub participant_timeout_secs: u64,
    /// Media server URL handed to the SIP process for joining rooms
    pub ws_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
    /// No store: admin calls fail with "SIP not connected"
    Disabled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:7880/rpc".to_string(),
            participant_timeout_secs: 30,
            ws_url: String::new(),
        }
    }
}

impl SipConfig {
    pub fn participant_timeout(&self) -> Duration {
        Duration::from_secs(self.participant_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost/sipdesk".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,   // 10 minutes
            max_lifetime_secs: 1800,  // 30 minutes
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `$SIPDESK_CONFIG` (required when set) or `./sipdesk.toml` (optional),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let (path, required) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        ::config::Config::builder()
            .add_source(File::with_name(&path).required(required))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        ::config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
