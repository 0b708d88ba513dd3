use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::channels::adapter::{AdapterHealth, ChannelAdapter, SendReceipt, SendRequest};
use crate::errors::{GatewayError, GatewayResult};
use crate::model::ChannelType;

/// Holds one adapter per channel type and delegates sends and health probes.
/// Built once at bootstrap and shared via `Arc`.
pub struct ChannelRegistry {
    adapters: HashMap<ChannelType, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        let channel = adapter.channel_type();
        info!("channel adapter registered: {}", channel);
        self.adapters.insert(channel, adapter);
    }

    pub fn get(&self, channel: ChannelType) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelType> + '_ {
        self.adapters.keys().copied()
    }

    /// Delegate a send to the matching adapter. Adapter internals never reach
    /// the caller; the full error is logged here.
    pub async fn send(&self, request: &SendRequest) -> GatewayResult<SendReceipt> {
        let Some(adapter) = self.adapters.get(&request.channel_type) else {
            return Err(GatewayError::Downstream(format!(
                "no adapter for channel {}",
                request.channel_type
            )));
        };

        adapter.send(request).await.map_err(|e| {
            error!("{} adapter send failed: {:#}", request.channel_type, e);
            GatewayError::Downstream(format!("{} send failed", request.channel_type))
        })
    }

    pub async fn health(&self, channel: ChannelType) -> AdapterHealth {
        match self.adapters.get(&channel) {
            Some(adapter) => adapter.health().await,
            None => AdapterHealth::Unconfigured,
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
