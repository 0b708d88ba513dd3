use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::ChannelType;

/// A message handed to a channel adapter for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub user_id: i64,
    pub channel_type: ChannelType,
    pub channel_contact_id: String,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Channel-specific session handle (WhatsApp-style channels).
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_id: String,
}

/// Result of an adapter health probe. `Unconfigured` (e.g. missing bot
/// token) is not a failure and never degrades the composite verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterHealth {
    Healthy,
    Unconfigured,
    Failed(String),
}

/// External collaborator wrapping one vendor integration. The gateway core
/// only ever calls these three operations; vendor protocol details stay on
/// the other side of this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    async fn send(&self, request: &SendRequest) -> anyhow::Result<SendReceipt>;

    async fn health(&self) -> AdapterHealth;
}
