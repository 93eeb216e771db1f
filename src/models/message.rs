//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of message payload.
///
/// For `Text` the content is the literal text; for the media kinds it is an
/// opaque payload reference (URI or inline-encoded binary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Voice,
}

/// Delivery status. This client never mutates status after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// A message within a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageType,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(serde_json::to_string(&MessageType::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&MessageType::Voice).unwrap(), "\"voice\"");
        assert_eq!(
            serde_json::from_str::<MessageStatus>("\"sent\"").unwrap(),
            MessageStatus::Sent
        );
    }
}
