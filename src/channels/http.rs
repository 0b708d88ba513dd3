use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

use crate::channels::adapter::{AdapterHealth, ChannelAdapter, SendReceipt, SendRequest};
use crate::model::ChannelType;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Thin HTTP wrapper around an out-of-process channel adapter. The adapter
/// service owns all vendor logic; this side only forwards
/// `POST {base}/send` and probes `GET {base}/health`.
pub struct HttpChannelAdapter {
    channel_type: ChannelType,
    base_url: Option<String>,
    client: reqwest::Client,
}

impl HttpChannelAdapter {
    pub fn new(channel_type: ChannelType, base_url: Option<String>) -> Self {
        let base_url = base_url
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string());
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            channel_type,
            base_url,
            client,
        }
    }
}

#[async_trait]
impl ChannelAdapter for HttpChannelAdapter {
    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    async fn send(&self, request: &SendRequest) -> Result<SendReceipt> {
        let Some(base) = self.base_url.as_deref() else {
            bail!("{} adapter not configured", self.channel_type);
        };

        let response = self
            .client
            .post(format!("{}/send", base))
            .json(request)
            .send()
            .await
            .with_context(|| format!("{} adapter unreachable", self.channel_type))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "{} adapter send failed: {} {}",
                self.channel_type,
                status,
                body
            );
        }

        let receipt: SendReceipt = response
            .json()
            .await
            .with_context(|| format!("{} adapter returned malformed receipt", self.channel_type))?;
        debug!(
            "sent via {} adapter: message_id={}",
            self.channel_type, receipt.message_id
        );
        Ok(receipt)
    }

    async fn health(&self) -> AdapterHealth {
        let Some(base) = self.base_url.as_deref() else {
            return AdapterHealth::Unconfigured;
        };

        match self.client.get(format!("{}/health", base)).send().await {
            Ok(response) if response.status().is_success() => AdapterHealth::Healthy,
            Ok(response) => AdapterHealth::Failed(format!(
                "{} adapter health returned {}",
                self.channel_type,
                response.status()
            )),
            Err(e) => AdapterHealth::Failed(format!(
                "{} adapter unreachable: {}",
                self.channel_type, e
            )),
        }
    }
}
