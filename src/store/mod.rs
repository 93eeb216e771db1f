//! Remote store adapter
//!
//! Abstracts the Supabase-style backend: PostgREST-like CRUD over HTTP plus
//! a realtime websocket channel that pushes newly inserted message rows.
//! The engine only ever talks to the [`RemoteStore`] trait so tests can run
//! against an in-memory store.

pub mod realtime;
pub mod rest;
pub mod rows;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{Conversation, Message, User};
use rows::{NewConversationRow, NewMessageRow, NewUserRow};

/// Errors from the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("realtime channel failed: {0}")]
    Realtime(String),
}

/// Live feed of newly inserted message rows.
///
/// Dropping the feed (or calling [`MessageFeed::unsubscribe`]) tears down
/// the underlying subscription task.
pub struct MessageFeed {
    rx: mpsc::Receiver<Message>,
    task: Option<JoinHandle<()>>,
}

impl MessageFeed {
    pub fn new(rx: mpsc::Receiver<Message>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Next inserted message, in arrival order. `None` when the feed closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Release the subscription.
    pub fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Operations the messaging client needs from the remote store.
#[async_trait]
pub trait RemoteStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, row: &NewUserRow) -> Result<User, StoreError>;

    /// Conversations the user participates in, with participant ids embedded
    /// and empty message lists.
    async fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// All messages for the given conversations, ordered by ascending
    /// timestamp.
    async fn list_messages(&self, conversation_ids: &[String]) -> Result<Vec<Message>, StoreError>;

    async fn insert_message(&self, row: &NewMessageRow) -> Result<(), StoreError>;

    /// Insert a conversation row and return the created conversation (empty
    /// participant and message lists; participants are inserted separately).
    async fn insert_conversation(&self, row: &NewConversationRow)
        -> Result<Conversation, StoreError>;

    async fn insert_participants(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<(), StoreError>;

    /// Existing private conversation between the unordered pair, if any.
    /// Pair uniqueness is enforced server-side.
    async fn find_private_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Subscribe to newly inserted message rows. Delivery is at-least-once
    /// and in arrival order within the stream.
    async fn subscribe_inserted_messages(&self) -> Result<MessageFeed, StoreError>;
}
