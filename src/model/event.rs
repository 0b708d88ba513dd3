use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::channel::ChannelType;
use crate::model::message::{MessageStatus, UnifiedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "message.received")]
    MessageReceived,
    #[serde(rename = "message.sent")]
    MessageSent,
    #[serde(rename = "message.delivered")]
    MessageDelivered,
    #[serde(rename = "message.read")]
    MessageRead,
    #[serde(rename = "session.status")]
    SessionStatus,
}

impl EventType {
    /// The delivery status a message-status event implies, if any.
    pub fn message_status(self) -> Option<MessageStatus> {
        match self {
            EventType::MessageSent => Some(MessageStatus::Sent),
            EventType::MessageDelivered => Some(MessageStatus::Delivered),
            EventType::MessageRead => Some(MessageStatus::Read),
            EventType::MessageReceived | EventType::SessionStatus => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connected,
    Disconnected,
    QrRequired,
}

/// Channel-adapter connectivity report, primarily for WhatsApp-style session
/// channels where login happens via QR code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub status: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Message(UnifiedMessage),
    Session(SessionStatus),
}

/// Envelope published on the event bus. Constructed by the routes layer and
/// immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub channel_type: ChannelType,
    pub user_id: i64,
    pub data: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn message(event_type: EventType, message: UnifiedMessage) -> Self {
        Self {
            event_type,
            channel_type: message.channel_type,
            user_id: message.user_id,
            data: EventPayload::Message(message),
            timestamp: Utc::now(),
        }
    }

    pub fn session(channel_type: ChannelType, user_id: i64, status: SessionStatus) -> Self {
        Self {
            event_type: EventType::SessionStatus,
            channel_type,
            user_id,
            data: EventPayload::Session(status),
            timestamp: Utc::now(),
        }
    }
}
