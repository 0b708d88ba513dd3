use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{ChannelType, Conversation, UnifiedMessage};

type ConversationKey = (i64, String, ChannelType);

/// In-memory conversation cache owned by the routes layer. Conversations are
/// created on the first message for a (user, contact, channel) triple and
/// mutated on every subsequent message in either direction; they are never
/// removed here (archival is a status change).
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<ConversationKey, Conversation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the conversation for a message and fold the message into its
    /// denormalized cache. Returns a snapshot of the updated conversation.
    pub fn record(&self, msg: &UnifiedMessage) -> Conversation {
        let key = (
            msg.user_id,
            msg.channel_contact_id.clone(),
            msg.channel_type,
        );
        let mut map = self
            .conversations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let conv = map.entry(key).or_insert_with(|| {
            Conversation::new(msg.user_id, &msg.channel_contact_id, msg.channel_type)
        });
        conv.record_message(msg);
        conv.clone()
    }

    /// Explicit read acknowledgement for one conversation.
    pub fn mark_read(&self, user_id: i64, channel_contact_id: &str, channel: ChannelType) {
        let key = (user_id, channel_contact_id.to_string(), channel);
        if let Some(conv) = self
            .conversations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(&key)
        {
            conv.mark_read();
        }
    }

    pub fn get(
        &self,
        user_id: i64,
        channel_contact_id: &str,
        channel: ChannelType,
    ) -> Option<Conversation> {
        self.conversations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(user_id, channel_contact_id.to_string(), channel))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
