use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::bus::transport::BusTransport;
use crate::errors::{GatewayError, GatewayResult};
use crate::model::{EventType, WebhookEvent};

/// The fixed set of logical channels on the backbone. Wire names are part of
/// the contract between the gateway and its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusChannel {
    MessageReceived,
    MessageSent,
    MessageStatus,
    SessionStatus,
    SendCommand,
}

impl BusChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            BusChannel::MessageReceived => "courier:message:received",
            BusChannel::MessageSent => "courier:message:sent",
            BusChannel::MessageStatus => "courier:message:status",
            BusChannel::SessionStatus => "courier:session:status",
            BusChannel::SendCommand => "courier:send",
        }
    }

    pub fn for_event(event_type: EventType) -> Self {
        match event_type {
            EventType::MessageReceived => BusChannel::MessageReceived,
            EventType::MessageSent => BusChannel::MessageSent,
            EventType::MessageDelivered | EventType::MessageRead => BusChannel::MessageStatus,
            EventType::SessionStatus => BusChannel::SessionStatus,
        }
    }
}

/// Publishes unified events to the backbone and manages connection lifecycle.
/// An explicitly constructed, injected resource: the bootstrap owns it and
/// hands `Arc` clones to the routes (open → use → close).
pub struct EventBus {
    transport: Arc<dyn BusTransport>,
}

impl EventBus {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self { transport }
    }

    /// Serialize and publish an event on the channel implied by its type.
    /// Failures are logged and surfaced to the caller, never swallowed.
    pub async fn publish_event(&self, event: &WebhookEvent) -> GatewayResult<()> {
        let channel = BusChannel::for_event(event.event_type);
        let payload =
            serde_json::to_vec(event).context("event serialization failed")?;
        match self.transport.publish(channel.as_str(), &payload).await {
            Ok(()) => {
                debug!(
                    "published {:?} event for user {} on {}",
                    event.event_type,
                    event.user_id,
                    channel.as_str()
                );
                Ok(())
            }
            Err(e) => {
                error!("event publish on {} failed: {:#}", channel.as_str(), e);
                Err(GatewayError::Downstream(format!(
                    "event bus publish failed: {}",
                    e
                )))
            }
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.transport.ping().await
    }

    pub async fn subscribe(&self, channel: BusChannel) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.transport.subscribe(channel.as_str()).await
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::transport::MemoryTransport;
    use crate::model::{ChannelType, EventType, UnifiedMessage};

    fn bus_with_memory() -> (EventBus, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        (EventBus::new(transport.clone()), transport)
    }

    #[test]
    fn status_events_share_one_channel() {
        assert_eq!(
            BusChannel::for_event(EventType::MessageDelivered),
            BusChannel::MessageStatus
        );
        assert_eq!(
            BusChannel::for_event(EventType::MessageRead),
            BusChannel::MessageStatus
        );
        assert_eq!(
            BusChannel::for_event(EventType::MessageSent),
            BusChannel::MessageSent
        );
    }

    #[tokio::test]
    async fn publish_routes_to_named_channel() {
        let (bus, transport) = bus_with_memory();
        let msg = UnifiedMessage::inbound(ChannelType::WhatsApp, "491700000", 1, "hi");
        let event = WebhookEvent::message(EventType::MessageReceived, msg);
        bus.publish_event(&event).await.unwrap();

        let log = transport.published().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "courier:message:received");
        let decoded: WebhookEvent = serde_json::from_slice(&log[0].1).unwrap();
        assert_eq!(decoded.event_type, EventType::MessageReceived);
        assert_eq!(decoded.user_id, 1);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let (bus, _transport) = bus_with_memory();
        let mut rx = bus.subscribe(BusChannel::SessionStatus).await.unwrap();

        let event = WebhookEvent::session(
            ChannelType::WhatsApp,
            3,
            crate::model::SessionStatus {
                session_id: "wa-3".into(),
                status: crate::model::SessionState::Connected,
                qr_code: None,
            },
        );
        bus.publish_event(&event).await.unwrap();

        let raw = rx.recv().await.unwrap();
        let decoded: WebhookEvent = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded.event_type, EventType::SessionStatus);
    }

    #[tokio::test]
    async fn publish_failure_propagates_as_downstream() {
        struct FailingTransport;

        #[async_trait::async_trait]
        impl BusTransport for FailingTransport {
            async fn publish(&self, _channel: &str, _payload: &[u8]) -> Result<()> {
                anyhow::bail!("connection refused")
            }
            async fn ping(&self) -> Result<()> {
                anyhow::bail!("connection refused")
            }
            async fn subscribe(
                &self,
                _channel: &str,
            ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
                anyhow::bail!("connection refused")
            }
            async fn close(&self) {}
        }

        let bus = EventBus::new(Arc::new(FailingTransport));
        let msg = UnifiedMessage::inbound(ChannelType::Telegram, "42", 1, "hi");
        let event = WebhookEvent::message(EventType::MessageReceived, msg);
        let err = bus.publish_event(&event).await.unwrap_err();
        assert!(matches!(err, GatewayError::Downstream(_)));
    }
}
