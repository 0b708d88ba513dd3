pub mod channel;
pub mod conversation;
pub mod event;
pub mod message;

pub use channel::{ChannelConfig, ChannelCredentials, ChannelType};
pub use conversation::{Conversation, ConversationStatus};
pub use event::{EventPayload, EventType, SessionState, SessionStatus, WebhookEvent};
pub use message::{Direction, MessageStatus, StatusLedger, Transition, UnifiedMessage};
