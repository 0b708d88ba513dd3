use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::channel::ChannelType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Delivery lifecycle of a message. `pending → sent → delivered → read` is
/// ordered; `failed` is terminal and reachable from any non-terminal state;
/// `received` marks inbound messages, which never enter the outbound
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    /// Position in the delivery lifecycle. `failed` and `received` sit
    /// outside the ordered chain.
    fn lifecycle_rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed | MessageStatus::Received => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Read | MessageStatus::Failed | MessageStatus::Received
        )
    }
}

/// Canonical representation of a single message regardless of source channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMessage {
    pub id: String,
    pub channel_type: ChannelType,
    pub channel_contact_id: String,
    pub user_id: i64,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_avatar: Option<String>,
    pub direction: Direction,
    #[serde(default)]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    /// Opaque vendor payload, preserved for audit/debug.
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
}

impl UnifiedMessage {
    /// A freshly received inbound message. Inbound messages never carry
    /// `pending`; they start at `received`.
    pub fn inbound(
        channel_type: ChannelType,
        channel_contact_id: impl Into<String>,
        user_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_type,
            channel_contact_id: channel_contact_id.into(),
            user_id,
            text: text.into(),
            media_urls: Vec::new(),
            sender_name: None,
            sender_avatar: None,
            direction: Direction::Inbound,
            is_ai_generated: false,
            ai_confidence: None,
            status: MessageStatus::Received,
            timestamp: Utc::now(),
            raw_data: None,
        }
    }

    /// An outbound message handed to a channel adapter, starting at `pending`.
    pub fn outbound(
        channel_type: ChannelType,
        channel_contact_id: impl Into<String>,
        user_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_type,
            channel_contact_id: channel_contact_id.into(),
            user_id,
            text: text.into(),
            media_urls: Vec::new(),
            sender_name: None,
            sender_avatar: None,
            direction: Direction::Outbound,
            is_ai_generated: false,
            ai_confidence: None,
            status: MessageStatus::Pending,
            timestamp: Utc::now(),
            raw_data: None,
        }
    }

    /// Enforce cross-field invariants on messages decoded from the wire.
    pub fn validate(&self) -> Result<(), String> {
        if self.direction == Direction::Inbound && self.status == MessageStatus::Pending {
            return Err("inbound messages cannot be pending".to_string());
        }
        Ok(())
    }
}

/// Whether a status update was applied or ignored by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored,
}

/// Tracks the last observed delivery status per message id and refuses
/// regressions: for a fixed id the observed sequence is non-decreasing in
/// lifecycle order, with `failed` reachable from any non-terminal state.
#[derive(Debug, Default)]
pub struct StatusLedger {
    statuses: HashMap<String, MessageStatus>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, id: &str) -> Option<MessageStatus> {
        self.statuses.get(id).copied()
    }

    pub fn apply(&mut self, id: &str, next: MessageStatus) -> Transition {
        let Some(&current) = self.statuses.get(id) else {
            self.statuses.insert(id.to_string(), next);
            return Transition::Applied;
        };

        let accept = match (current.lifecycle_rank(), next.lifecycle_rank()) {
            (Some(cur), Some(nxt)) => nxt > cur,
            // failed from any non-terminal state
            (_, None) => next == MessageStatus::Failed && !current.is_terminal(),
            // lifecycle updates never follow a non-lifecycle state
            (None, Some(_)) => false,
        };

        if accept {
            self.statuses.insert(id.to_string(), next);
            Transition::Applied
        } else {
            Transition::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_constructor_never_pending() {
        let msg = UnifiedMessage::inbound(ChannelType::WhatsApp, "491700000", 1, "hi");
        assert_eq!(msg.status, MessageStatus::Received);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn inbound_pending_rejected_by_validate() {
        let mut msg = UnifiedMessage::inbound(ChannelType::Telegram, "12345", 1, "hi");
        msg.status = MessageStatus::Pending;
        assert!(msg.validate().is_err());
    }

    #[test]
    fn camel_case_wire_shape() {
        let msg = UnifiedMessage::outbound(ChannelType::Instagram, "ig-9", 3, "hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["channelType"], "instagram");
        assert_eq!(value["channelContactId"], "ig-9");
        assert_eq!(value["direction"], "outbound");
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn ledger_accepts_forward_transitions() {
        let mut ledger = StatusLedger::new();
        assert_eq!(ledger.apply("m1", MessageStatus::Pending), Transition::Applied);
        assert_eq!(ledger.apply("m1", MessageStatus::Sent), Transition::Applied);
        assert_eq!(ledger.apply("m1", MessageStatus::Delivered), Transition::Applied);
        assert_eq!(ledger.apply("m1", MessageStatus::Read), Transition::Applied);
    }

    #[test]
    fn ledger_never_regresses() {
        let mut ledger = StatusLedger::new();
        ledger.apply("m1", MessageStatus::Delivered);
        assert_eq!(ledger.apply("m1", MessageStatus::Sent), Transition::Ignored);
        assert_eq!(ledger.current("m1"), Some(MessageStatus::Delivered));
    }

    #[test]
    fn ledger_ignores_duplicate_status() {
        let mut ledger = StatusLedger::new();
        ledger.apply("m1", MessageStatus::Sent);
        assert_eq!(ledger.apply("m1", MessageStatus::Sent), Transition::Ignored);
    }

    #[test]
    fn failed_reachable_from_non_terminal_only() {
        let mut ledger = StatusLedger::new();
        ledger.apply("m1", MessageStatus::Sent);
        assert_eq!(ledger.apply("m1", MessageStatus::Failed), Transition::Applied);
        // Terminal now; nothing else lands.
        assert_eq!(ledger.apply("m1", MessageStatus::Delivered), Transition::Ignored);

        ledger.apply("m2", MessageStatus::Read);
        assert_eq!(ledger.apply("m2", MessageStatus::Failed), Transition::Ignored);
    }

    #[test]
    fn independent_ids_do_not_interfere() {
        let mut ledger = StatusLedger::new();
        ledger.apply("m1", MessageStatus::Read);
        assert_eq!(ledger.apply("m2", MessageStatus::Pending), Transition::Applied);
        assert_eq!(ledger.current("m2"), Some(MessageStatus::Pending));
    }
}
