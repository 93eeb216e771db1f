//! Row shapes for the store schema
//!
//! The store speaks snake_case rows (`users`, `conversations`,
//! `conversation_participants`, `messages`); the rest of the crate uses the
//! internal model types. All casing/shape normalization happens here, at the
//! adapter seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Conversation, ConversationKind, Message, MessageStatus, MessageType, User,
};

/// Row from the `users` table.
#[derive(Debug, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub phone_number: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            avatar: row.avatar,
            phone_number: row.phone_number,
        }
    }
}

/// Insert payload for the `users` table.
#[derive(Debug, Serialize)]
pub struct NewUserRow {
    pub name: String,
    pub avatar: String,
    pub phone_number: String,
}

/// Row from the `messages` table (also the realtime INSERT record shape).
#[derive(Debug, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub status: MessageStatus,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            timestamp: row.timestamp,
            kind: row.kind,
            status: row.status,
        }
    }
}

/// Insert payload for the `messages` table. The store assigns id and
/// timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessageRow {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub status: MessageStatus,
}

/// Embedded participant row from the conversation query.
#[derive(Debug, Deserialize)]
pub struct ParticipantRow {
    pub user_id: String,
}

/// Row from the `conversations` table with participants embedded via
/// `conversation_participants!inner(user_id)`.
#[derive(Debug, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub conversation_participants: Vec<ParticipantRow>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            kind: row.kind,
            name: row.name,
            avatar: row.avatar,
            participants: row
                .conversation_participants
                .into_iter()
                .map(|p| p.user_id)
                .collect(),
            messages: Vec::new(),
            typing_user_ids: Vec::new(),
        }
    }
}

/// Insert payload for the `conversations` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewConversationRow {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// Insert payload for the `conversation_participants` table.
#[derive(Debug, Serialize)]
pub struct NewParticipantRow {
    pub conversation_id: String,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_row_decodes_store_casing() {
        let json = r#"{
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "content": "hello",
            "timestamp": "2024-05-01T12:00:00Z",
            "type": "text",
            "status": "sent"
        }"#;
        let row: MessageRow = serde_json::from_str(json).unwrap();
        let msg = Message::from(row);
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(msg.status, MessageStatus::Sent);
    }

    #[test]
    fn test_conversation_row_flattens_participants() {
        let json = r#"{
            "id": "c1",
            "type": "group",
            "name": "book club",
            "avatar": null,
            "conversation_participants": [
                {"user_id": "u1"},
                {"user_id": "u2"},
                {"user_id": "u3"}
            ]
        }"#;
        let row: ConversationRow = serde_json::from_str(json).unwrap();
        let convo = Conversation::from(row);
        assert_eq!(convo.kind, ConversationKind::Group);
        assert_eq!(convo.participants, vec!["u1", "u2", "u3"]);
        assert!(convo.messages.is_empty());
    }

    #[test]
    fn test_new_message_row_serializes_type_column() {
        let row = NewMessageRow {
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            content: "hi".to_string(),
            kind: MessageType::Image,
            status: MessageStatus::Sent,
        };
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["type"], "image");
        assert_eq!(v["status"], "sent");
        assert!(v.get("id").is_none());
    }
}
