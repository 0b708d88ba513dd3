use serde::{Deserialize, Serialize};

/// Channel type enumeration for type-safe channel identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    WhatsApp,
    Telegram,
    Instagram,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::WhatsApp => "whatsapp",
            ChannelType::Telegram => "telegram",
            ChannelType::Instagram => "instagram",
        }
    }

    pub const ALL: [ChannelType; 3] = [
        ChannelType::WhatsApp,
        ChannelType::Telegram,
        ChannelType::Instagram,
    ];
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(ChannelType::WhatsApp),
            "telegram" => Ok(ChannelType::Telegram),
            "instagram" => Ok(ChannelType::Instagram),
            _ => Err(format!("Unknown channel type: {}", s)),
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-channel credential shapes. The union is closed: a channel type can only
/// carry its own shape, enforced by the tag at deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelCredentials {
    WhatsApp {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Telegram {
        #[serde(rename = "botToken")]
        bot_token: String,
    },
    Instagram {
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "pageId")]
        page_id: String,
        #[serde(rename = "igAccountId")]
        ig_account_id: String,
    },
}

impl ChannelCredentials {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            ChannelCredentials::WhatsApp { .. } => ChannelType::WhatsApp,
            ChannelCredentials::Telegram { .. } => ChannelType::Telegram,
            ChannelCredentials::Instagram { .. } => ChannelType::Instagram,
        }
    }
}

/// Per-user, per-channel configuration as held by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub user_id: i64,
    pub credentials: ChannelCredentials,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub ai_system_prompt: Option<String>,
    #[serde(default)]
    pub escalation_keywords: Vec<String>,
    #[serde(default)]
    pub is_connected: bool,
}

impl ChannelConfig {
    pub fn channel_type(&self) -> ChannelType {
        self.credentials.channel_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn as_str_round_trips_from_str() {
        for ct in ChannelType::ALL {
            assert_eq!(ChannelType::from_str(ct.as_str()).unwrap(), ct);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        let result = ChannelType::from_str("discord");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "Unknown channel type: discord");
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&ChannelType::WhatsApp).unwrap();
        assert_eq!(json, "\"whatsapp\"");
        let back: ChannelType = serde_json::from_str("\"instagram\"").unwrap();
        assert_eq!(back, ChannelType::Instagram);
    }

    #[test]
    fn credentials_tag_matches_channel() {
        let creds: ChannelCredentials = serde_json::from_value(serde_json::json!({
            "type": "telegram",
            "botToken": "123:abc",
        }))
        .unwrap();
        assert_eq!(creds.channel_type(), ChannelType::Telegram);
    }

    #[test]
    fn credentials_union_is_closed() {
        // A telegram-tagged object cannot carry a whatsapp shape.
        let result: Result<ChannelCredentials, _> = serde_json::from_value(serde_json::json!({
            "type": "telegram",
            "sessionId": "wa-1",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn instagram_requires_all_three_fields() {
        let result: Result<ChannelCredentials, _> = serde_json::from_value(serde_json::json!({
            "type": "instagram",
            "accessToken": "t",
            "pageId": "p",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn channel_config_deserializes_with_defaults() {
        let cfg: ChannelConfig = serde_json::from_value(serde_json::json!({
            "userId": 7,
            "credentials": {"type": "whatsapp", "sessionId": "s-1"},
        }))
        .unwrap();
        assert_eq!(cfg.user_id, 7);
        assert_eq!(cfg.channel_type(), ChannelType::WhatsApp);
        assert!(!cfg.ai_enabled);
        assert!(cfg.escalation_keywords.is_empty());
    }
}
