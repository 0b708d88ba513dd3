use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// Process-wide (chat id → tenant user id) bindings plus a fallback default
/// recipient. Registration is idempotent and each call is isolated: a failed
/// or repeated registration never disturbs unrelated bindings.
#[derive(Debug, Default)]
pub struct TelegramBindings {
    bindings: Mutex<HashMap<String, i64>>,
    default_user: Mutex<Option<i64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingsSnapshot {
    pub bindings: usize,
    pub default_user: Option<i64>,
}

impl TelegramBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a chat to a user and make that user the default recipient.
    pub fn register(&self, user_id: i64, chat_id: Option<&str>) {
        if let Some(chat_id) = chat_id {
            self.bindings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(chat_id.to_string(), user_id);
            info!("telegram chat {} bound to user {}", chat_id, user_id);
        }
        *self
            .default_user
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(user_id);
    }

    /// Remove a chat binding and/or clear the default recipient. Unknown
    /// chat ids are a no-op (idempotent unregistration).
    pub fn unregister(&self, user_id: Option<i64>, chat_id: Option<&str>) {
        if let Some(chat_id) = chat_id {
            self.bindings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(chat_id);
            info!("telegram chat {} unbound", chat_id);
        }
        let mut default = self
            .default_user
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if user_id.is_some() && *default == user_id {
            *default = None;
        }
    }

    pub fn resolve(&self, chat_id: &str) -> Option<i64> {
        let bound = self
            .bindings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(chat_id)
            .copied();
        bound.or_else(|| {
            *self
                .default_user
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        })
    }

    pub fn snapshot(&self) -> BindingsSnapshot {
        BindingsSnapshot {
            bindings: self
                .bindings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            default_user: *self
                .default_user
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        }
    }
}
