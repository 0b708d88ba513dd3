use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::channel::ChannelType;
use crate::model::message::{Direction, UnifiedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Closed,
}

/// A conversation with one contact on one channel. Created on the first
/// inbound message for a (user, contact, channel) triple; the denormalized
/// `last_message*` / `unread_count` fields are owned by the routes layer and
/// only mutated through [`record_message`](Self::record_message) and
/// [`mark_read`](Self::mark_read). Conversations are archived, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: i64,
    pub channel_contact_id: String,
    pub channel_type: ChannelType,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    pub status: ConversationStatus,
    #[serde(default)]
    pub assigned_to_id: Option<i64>,
}

impl Conversation {
    pub fn new(user_id: i64, channel_contact_id: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            channel_contact_id: channel_contact_id.into(),
            channel_type,
            contact_name: None,
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            status: ConversationStatus::Active,
            assigned_to_id: None,
        }
    }

    /// Fold a message into the denormalized cache. Inbound messages bump the
    /// unread counter; outbound ones do not.
    pub fn record_message(&mut self, msg: &UnifiedMessage) {
        self.last_message = Some(msg.text.clone());
        self.last_message_at = Some(msg.timestamp);
        if msg.direction == Direction::Inbound {
            self.unread_count += 1;
            if self.contact_name.is_none() {
                self.contact_name = msg.sender_name.clone();
            }
        }
    }

    /// Explicit read acknowledgement — the only operation that decrements.
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }

    pub fn archive(&mut self) {
        self.status = ConversationStatus::Archived;
    }
}
