use serde::{Deserialize, Serialize};

use crate::auth::SignaturePolicy;
use crate::limit::RateLimitConfig;
use crate::model::ChannelType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deployment environment. Controls webhook signature enforcement
/// strictness; everything else behaves identically in both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn signature_policy(self) -> SignaturePolicy {
        match self {
            Environment::Development => SignaturePolicy::Optional,
            Environment::Production => SignaturePolicy::Required,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_url")]
    pub url: String,
}

fn default_bus_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub service_url: Option<String>,
}

/// Where one channel's adapter service lives. Unset means the channel is not
/// configured on this deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEndpoint {
    #[serde(default)]
    pub adapter_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: ChannelEndpoint,
    #[serde(default)]
    pub telegram: ChannelEndpoint,
    #[serde(default)]
    pub instagram: ChannelEndpoint,
}

impl ChannelsConfig {
    pub fn endpoint(&self, channel: ChannelType) -> &ChannelEndpoint {
        match channel {
            ChannelType::WhatsApp => &self.whatsapp,
            ChannelType::Telegram => &self.telegram,
            ChannelType::Instagram => &self.instagram,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    #[serde(default = "default_general_limit")]
    pub general: u32,
    #[serde(default = "default_webhook_limit")]
    pub webhook: u32,
    #[serde(default = "default_send_limit")]
    pub send: u32,
}

fn default_general_limit() -> u32 {
    100
}

fn default_webhook_limit() -> u32 {
    500
}

fn default_send_limit() -> u32 {
    60
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            general: default_general_limit(),
            webhook: default_webhook_limit(),
            send: default_send_limit(),
        }
    }
}

impl From<LimitSettings> for RateLimitConfig {
    fn from(s: LimitSettings) -> Self {
        RateLimitConfig {
            general: s.general,
            webhook: s.webhook,
            send: s.send,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout_secs() -> u64 {
    3
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub environment: Environment,
    /// Shared secret for backend-to-gateway calls. Absence fails the
    /// authenticated routes closed at the point of use.
    #[serde(default)]
    pub service_api_key: Option<String>,
    /// Webhook signing secret.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub health: HealthConfig,
}
