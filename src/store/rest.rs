//! PostgREST-style store adapter
//!
//! Talks to a Supabase-flavored backend: `/rest/v1/{table}` with `apikey` +
//! bearer auth headers, embedded-resource selects, and RPC for the
//! private-pair lookup. The realtime subscription lives in
//! [`super::realtime`].

use async_trait::async_trait;
use serde_json::json;

use crate::models::{Conversation, Message, User};

use super::realtime;
use super::rows::{
    ConversationRow, MessageRow, NewConversationRow, NewMessageRow, NewParticipantRow, NewUserRow,
    UserRow,
};
use super::{MessageFeed, RemoteStore, StoreError};

/// REST adapter for the remote store.
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestStore {
    /// `base_url` is the project root, e.g. `https://xyz.supabase.co`.
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, StoreError> {
        let url = self.rest_url(path);
        tracing::debug!("store GET {}", url);

        let resp = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await?;

        check_response(resp).await
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        prefer: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let url = self.rest_url(path);
        tracing::debug!("store POST {}", url);

        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await?;

        check_response(resp).await
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> = self.get("users?select=*").await?.json().await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let path = format!(
            "users?select=*&phone_number=eq.{}",
            urlencoding::encode(phone)
        );
        let rows: Vec<UserRow> = self.get(&path).await?.json().await?;
        Ok(rows.into_iter().next().map(User::from))
    }

    async fn insert_user(&self, row: &NewUserRow) -> Result<User, StoreError> {
        let body = serde_json::to_value(row)?;
        let resp = self.post("users", &body, "return=representation").await?;
        let mut created: Vec<UserRow> = resp.json().await?;
        created
            .pop()
            .map(User::from)
            .ok_or_else(|| StoreError::Status {
                status: 200,
                body: "user insert returned no row".to_string(),
            })
    }

    async fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        let path = format!(
            "conversations?select=id,type,name,avatar,conversation_participants!inner(user_id)\
             &conversation_participants.user_id=eq.{}",
            urlencoding::encode(user_id)
        );
        let rows: Vec<ConversationRow> = self.get(&path).await?.json().await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn list_messages(&self, conversation_ids: &[String]) -> Result<Vec<Message>, StoreError> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!(
            "messages?select=*&conversation_id=in.({})&order=timestamp.asc",
            in_list(conversation_ids)
        );
        let rows: Vec<MessageRow> = self.get(&path).await?.json().await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn insert_message(&self, row: &NewMessageRow) -> Result<(), StoreError> {
        let body = serde_json::to_value(row)?;
        self.post("messages", &body, "return=minimal").await?;
        Ok(())
    }

    async fn insert_conversation(
        &self,
        row: &NewConversationRow,
    ) -> Result<Conversation, StoreError> {
        let body = serde_json::to_value(row)?;
        let resp = self
            .post("conversations", &body, "return=representation")
            .await?;
        let mut created: Vec<ConversationRow> = resp.json().await?;
        created
            .pop()
            .map(Conversation::from)
            .ok_or_else(|| StoreError::Status {
                status: 200,
                body: "conversation insert returned no row".to_string(),
            })
    }

    async fn insert_participants(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<(), StoreError> {
        let rows: Vec<NewParticipantRow> = user_ids
            .iter()
            .map(|user_id| NewParticipantRow {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.clone(),
            })
            .collect();
        let body = serde_json::to_value(&rows)?;
        self.post("conversation_participants", &body, "return=minimal")
            .await?;
        Ok(())
    }

    async fn find_private_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<String>, StoreError> {
        let body = json!({ "user1_id": user_a, "user2_id": user_b });
        let resp = self
            .post("rpc/get_private_conversation_id", &body, "return=representation")
            .await?;
        // The RPC returns a bare nullable id.
        let id: Option<String> = resp.json().await?;
        Ok(id.filter(|s| !s.is_empty()))
    }

    async fn subscribe_inserted_messages(&self) -> Result<MessageFeed, StoreError> {
        realtime::subscribe(&self.base_url, &self.anon_key)
    }
}

/// Render ids as a PostgREST `in.(...)` list, quoting each element.
fn in_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{}\"", id)).collect();
    quoted.join(",")
}

/// Check HTTP response status and surface the body on failure.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_list_quotes_ids() {
        let ids = vec!["c1".to_string(), "c2".to_string()];
        assert_eq!(in_list(&ids), "\"c1\",\"c2\"");
    }

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let store = RestStore::new("https://example.supabase.co/", "key");
        assert_eq!(
            store.rest_url("users?select=*"),
            "https://example.supabase.co/rest/v1/users?select=*"
        );
    }
}
