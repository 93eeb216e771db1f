//! Conversation synchronization engine
//!
//! Owns the in-memory conversation map and merges three input sources into
//! one ordered, duplicate-free model: the initial bulk load, the realtime
//! push stream, and locally originated actions. Sent messages are never
//! applied optimistically; the push round-trip is the single source of
//! truth for what the store accepted.

pub mod call;
pub mod typing;

use std::cmp::Reverse;
use std::collections::HashMap;

use thiserror::Error;

use crate::models::{
    initials_avatar, Conversation, ConversationKind, Message, MessageStatus, MessageType, User,
};
use crate::store::rows::{NewConversationRow, NewMessageRow};
use crate::store::{RemoteStore, StoreError};

/// Errors surfaced at the engine's operation boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load chat data: {0}")]
    Load(#[source] StoreError),

    #[error("failed to send message: {0}")]
    Send(#[source] StoreError),

    #[error("failed to create conversation: {0}")]
    Create(#[source] StoreError),

    /// The conversation row exists but its participant rows do not. The
    /// orphaned row is not rolled back.
    #[error("conversation {conversation_id} was created but adding participants failed: {source}")]
    PartialCreate {
        conversation_id: String,
        #[source]
        source: StoreError,
    },

    #[error("a conversation needs at least two distinct participants")]
    NotEnoughParticipants,

    #[error("no active conversation selected")]
    NoActiveConversation,
}

/// Client-side view of the conversation set for one signed-in user.
///
/// Conversations are kept most-recently-active first; each conversation's
/// messages are ordered by ascending timestamp. All mutation happens on the
/// caller's single event-loop task.
pub struct ChatEngine<S> {
    store: S,
    current_user_id: String,
    users: Vec<User>,
    conversations: Vec<Conversation>,
    active_conversation_id: Option<String>,
}

impl<S: RemoteStore> ChatEngine<S> {
    pub fn new(store: S, current_user_id: impl Into<String>) -> Self {
        Self {
            store,
            current_user_id: current_user_id.into(),
            users: Vec::new(),
            conversations: Vec::new(),
            active_conversation_id: None,
        }
    }

    /// Bulk load: users, the user's conversations, and their full message
    /// history. All-or-nothing; on any fetch error the previous state is
    /// left untouched.
    pub async fn load(&mut self) -> Result<(), EngineError> {
        let users = self.store.list_users().await.map_err(EngineError::Load)?;

        let mut conversations = self
            .store
            .list_conversations_for_user(&self.current_user_id)
            .await
            .map_err(EngineError::Load)?;

        let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
        let messages = self
            .store
            .list_messages(&ids)
            .await
            .map_err(EngineError::Load)?;

        let mut by_conversation: HashMap<String, Vec<Message>> = HashMap::new();
        for msg in messages {
            by_conversation
                .entry(msg.conversation_id.clone())
                .or_default()
                .push(msg);
        }
        for convo in &mut conversations {
            convo.messages = by_conversation.remove(&convo.id).unwrap_or_default();
        }

        // Most recent first; conversations without messages sort after all
        // others, keeping their fetch order (stable sort).
        conversations.sort_by_key(|c| Reverse(c.last_message().map(|m| m.timestamp)));

        self.users = users;
        self.active_conversation_id = conversations.first().map(|c| c.id.clone());
        self.conversations = conversations;
        Ok(())
    }

    /// Apply a push-delivered inserted message.
    ///
    /// This is the sole path by which sent messages (local or remote) become
    /// visible. Events for conversations this session has not loaded are
    /// dropped; duplicates (at-least-once delivery) are ignored by id.
    pub fn apply_inserted_message(&mut self, msg: Message) {
        let Some(idx) = self
            .conversations
            .iter()
            .position(|c| c.id == msg.conversation_id)
        else {
            tracing::debug!(
                "dropping message {} for unknown conversation {}",
                msg.id,
                msg.conversation_id
            );
            return;
        };

        if self.conversations[idx].messages.iter().any(|m| m.id == msg.id) {
            tracing::debug!("ignoring duplicate message {}", msg.id);
            return;
        }

        let mut convo = self.conversations.remove(idx);
        convo.messages.push(msg);
        self.conversations.insert(0, convo);
    }

    /// Create a conversation with the given peers, or select the existing
    /// private conversation for a bare pair. Returns the conversation id.
    pub async fn create_conversation(
        &mut self,
        participant_ids: &[String],
        group_name: Option<&str>,
    ) -> Result<String, EngineError> {
        let mut members = vec![self.current_user_id.clone()];
        for id in participant_ids {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
        if members.len() < 2 {
            return Err(EngineError::NotEnoughParticipants);
        }

        // Private-conversation identity is keyed by the unordered pair and
        // deduplicated server-side.
        if members.len() == 2 && group_name.is_none() {
            if let Some(existing) = self
                .store
                .find_private_conversation(&members[0], &members[1])
                .await
                .map_err(EngineError::Create)?
            {
                self.active_conversation_id = Some(existing.clone());
                return Ok(existing);
            }
        }

        let row = NewConversationRow {
            kind: if members.len() > 2 {
                ConversationKind::Group
            } else {
                ConversationKind::Private
            },
            name: group_name.map(str::to_string),
            avatar: group_name.map(initials_avatar),
        };
        let mut convo = self
            .store
            .insert_conversation(&row)
            .await
            .map_err(EngineError::Create)?;

        if let Err(source) = self.store.insert_participants(&convo.id, &members).await {
            // No rollback of the conversation row; the inconsistency is
            // surfaced to the caller.
            return Err(EngineError::PartialCreate {
                conversation_id: convo.id,
                source,
            });
        }

        convo.participants = members;
        let id = convo.id.clone();
        self.conversations.insert(0, convo);
        self.active_conversation_id = Some(id.clone());
        Ok(id)
    }

    /// Write a message to the active conversation. Local state is not
    /// touched; the message appears when its push event arrives.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        kind: MessageType,
    ) -> Result<(), EngineError> {
        let conversation_id = self
            .active_conversation_id
            .clone()
            .ok_or(EngineError::NoActiveConversation)?;

        let row = NewMessageRow {
            conversation_id,
            sender_id: self.current_user_id.clone(),
            content: content.into(),
            kind,
            status: MessageStatus::Sent,
        };
        self.store
            .insert_message(&row)
            .await
            .map_err(EngineError::Send)
    }

    /// Mark a user as typing in a conversation.
    pub fn note_typing(&mut self, conversation_id: &str, user_id: &str) {
        if let Some(convo) = self.conversation_mut(conversation_id) {
            if !convo.typing_user_ids.iter().any(|u| u == user_id) {
                convo.typing_user_ids.push(user_id.to_string());
            }
        }
    }

    /// Remove a user's typing mark from a conversation.
    pub fn clear_typing(&mut self, conversation_id: &str, user_id: &str) {
        if let Some(convo) = self.conversation_mut(conversation_id) {
            convo.typing_user_ids.retain(|u| u != user_id);
        }
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    // -- Read-only projections for the presentation layer --

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_conversation_id
            .as_deref()
            .and_then(|id| self.conversation(id))
    }

    /// Select a loaded conversation as active. Returns false if unknown.
    pub fn set_active_conversation(&mut self, id: &str) -> bool {
        if self.conversations.iter().any(|c| c.id == id) {
            self.active_conversation_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user(&self.current_user_id)
    }
}
