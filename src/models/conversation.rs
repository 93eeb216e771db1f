//! Conversation-related models

use serde::{Deserialize, Serialize};

use super::{Message, User};

/// Conversation type.
///
/// A private conversation has exactly two participants and no name; a group
/// conversation carries a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

/// A conversation and its locally known message history.
///
/// `messages` is ordered by ascending timestamp; the synchronization engine
/// preserves that ordering under merge. `typing_user_ids` is ephemeral,
/// derived state and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub typing_user_ids: Vec<String>,
}

impl Conversation {
    /// Last message in the ordered history, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Display name: the group name, or the peer's name for private chats.
    pub fn display_name(&self, current_user_id: &str, users: &[User]) -> String {
        if let Some(ref name) = self.name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        self.participants
            .iter()
            .find(|id| id.as_str() != current_user_id)
            .and_then(|id| users.iter().find(|u| &u.id == id))
            .map(|u| u.name.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageStatus, MessageType};
    use chrono::{TimeZone, Utc};

    fn message(id: &str, ts: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            content: "hi".to_string(),
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            kind: MessageType::Text,
            status: MessageStatus::Sent,
        }
    }

    #[test]
    fn test_last_message() {
        let mut convo = Conversation {
            id: "c1".to_string(),
            kind: ConversationKind::Private,
            name: None,
            avatar: None,
            participants: vec!["u1".to_string(), "u2".to_string()],
            messages: vec![],
            typing_user_ids: vec![],
        };
        assert!(convo.last_message().is_none());

        convo.messages.push(message("m1", 10));
        convo.messages.push(message("m2", 20));
        assert_eq!(convo.last_message().unwrap().id, "m2");
    }

    #[test]
    fn test_display_name_private_uses_peer() {
        let users = vec![
            User {
                id: "u1".to_string(),
                name: "Ada".to_string(),
                avatar: String::new(),
                phone_number: "1".to_string(),
            },
            User {
                id: "u2".to_string(),
                name: "Grace".to_string(),
                avatar: String::new(),
                phone_number: "2".to_string(),
            },
        ];
        let convo = Conversation {
            id: "c1".to_string(),
            kind: ConversationKind::Private,
            name: None,
            avatar: None,
            participants: vec!["u1".to_string(), "u2".to_string()],
            messages: vec![],
            typing_user_ids: vec![],
        };
        assert_eq!(convo.display_name("u1", &users), "Grace");
        assert_eq!(convo.display_name("u2", &users), "Ada");
    }
}
