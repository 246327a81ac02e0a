//! Chat transcript entries and session configuration

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Repository;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Agent,
    System,
}

/// One transcript entry; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    /// Create a message stamped with a fresh id and the current time
    pub fn new(sender: ChatSender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: now_millis(),
        }
    }
}

/// Session configuration submitted once with SUBMIT_CONFIG
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(rename = "geminiToken")]
    pub gemini_token: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_has_unique_id() {
        let a = ChatMessage::new(ChatSender::User, "hi");
        let b = ChatMessage::new(ChatSender::User, "hi");
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }

    #[test]
    fn test_sender_wire_names() {
        assert_eq!(serde_json::to_string(&ChatSender::Agent).unwrap(), "\"agent\"");
        let s: ChatSender = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(s, ChatSender::System);
    }

    #[test]
    fn test_config_data_field_names() {
        let config = ConfigData {
            gemini_token: "g".into(),
            repositories: vec![],
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["geminiToken"], "g");
        assert!(json["repositories"].as_array().unwrap().is_empty());

        let parsed: ConfigData = serde_json::from_str(r#"{"geminiToken":"x"}"#).unwrap();
        assert!(parsed.repositories.is_empty());
    }
}
