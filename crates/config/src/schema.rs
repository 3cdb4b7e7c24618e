/// Config schema types (server, database, whatsapp, ip restriction).
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HugliConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub ip_restriction: IpRestrictionConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
            cors_origin: "*".into(),
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL. When unset, `<data_dir>/hugli.db` is used.
    pub url: Option<String>,
}

/// WhatsApp session settings. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Destination phone number (international format, digits only).
    pub target_number: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_secs: u64,
    pub bridge: BridgeConfig,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            target_number: "919464820510".into(),
            max_reconnect_attempts: 5,
            reconnect_delay_secs: 10,
            bridge: BridgeConfig::default(),
        }
    }
}

impl WhatsAppConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Connection settings for the WhatsApp Web bridge (Evolution API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_url: String,
    /// Never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub instance: String,
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            api_key: None,
            instance: "hugli-printing-whatsapp".into(),
            poll_interval_ms: 2000,
        }
    }
}

/// Client IP allow-list applied to every route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpRestrictionConfig {
    pub enabled: bool,
    pub allowed_ips: Vec<String>,
}

impl Default for IpRestrictionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_ips: vec!["127.0.0.1".into(), "::1".into(), "::ffff:127.0.0.1".into()],
        }
    }
}
