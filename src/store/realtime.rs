//! Realtime push channel
//!
//! Subscribes to the store's Phoenix-style websocket and forwards newly
//! inserted `messages` rows to the session. The socket is joined to the
//! `realtime:public:messages` topic and kept alive with heartbeat frames;
//! on transient failures the subscription reconnects with exponential
//! backoff (1s, 2s, 4s, ... capped at 64s).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::models::Message;

use super::rows::MessageRow;
use super::{MessageFeed, StoreError};

const TOPIC: &str = "realtime:public:messages";
const HEARTBEAT_SECS: u64 = 30;

/// Start a subscription task and hand back the feed.
pub fn subscribe(base_url: &str, anon_key: &str) -> Result<MessageFeed, StoreError> {
    let ws_url = format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        base_url
            .replace("https://", "wss://")
            .replace("http://", "ws://"),
        anon_key
    );

    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(run_subscription(ws_url, tx));
    Ok(MessageFeed::new(rx, Some(task)))
}

/// Reconnect loop. Exits when the feed receiver is dropped.
async fn run_subscription(ws_url: String, tx: mpsc::Sender<Message>) {
    let mut backoff = 1u64;

    loop {
        let connected_at = Instant::now();
        match run_session(&ws_url, &tx).await {
            Ok(()) => {
                // Receiver dropped; subscription released.
                return;
            }
            Err(e) => {
                if tx.is_closed() {
                    return;
                }
                // Connection was stable, start over with the minimum delay.
                if connected_at.elapsed() >= Duration::from_secs(60) {
                    backoff = 1;
                }
                tracing::warn!("realtime channel lost: {}. Reconnecting in {}s...", e, backoff);
                time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(64);
            }
        }
    }
}

/// One websocket session: connect, join the topic, pump frames.
///
/// Returns `Ok(())` only when the feed receiver is gone; any transport
/// problem is an `Err` so the caller reconnects.
async fn run_session(ws_url: &str, tx: &mpsc::Sender<Message>) -> Result<(), StoreError> {
    tracing::debug!("connecting realtime websocket");
    let (mut stream, response) = connect_async(ws_url)
        .await
        .map_err(|e| StoreError::Realtime(format!("connect failed: {}", e)))?;
    tracing::info!("realtime websocket connected (status={})", response.status());

    let join = json!({
        "topic": TOPIC,
        "event": "phx_join",
        "payload": {},
        "ref": "1",
    });
    stream
        .send(WsMessage::Text(join.to_string()))
        .await
        .map_err(|e| StoreError::Realtime(format!("join failed: {}", e)))?;

    let mut heartbeat = time::interval(Duration::from_secs(HEARTBEAT_SECS));
    heartbeat.tick().await; // skip the immediate first tick
    let mut heartbeat_ref: u64 = 1;

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(msg) = parse_inserted_message(&text) {
                            if tx.send(msg).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        stream
                            .send(WsMessage::Pong(data))
                            .await
                            .map_err(|e| StoreError::Realtime(format!("pong failed: {}", e)))?;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        return Err(StoreError::Realtime(format!(
                            "closed by server: {:?}",
                            frame
                        )));
                    }
                    Some(Ok(other)) => {
                        tracing::debug!("realtime frame (ignored): {:?}", other);
                    }
                    Some(Err(e)) => {
                        return Err(StoreError::Realtime(format!("receive error: {}", e)));
                    }
                    None => {
                        return Err(StoreError::Realtime("stream ended".to_string()));
                    }
                }
            }
            _ = heartbeat.tick() => {
                heartbeat_ref += 1;
                let beat = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "payload": {},
                    "ref": heartbeat_ref.to_string(),
                });
                stream
                    .send(WsMessage::Text(beat.to_string()))
                    .await
                    .map_err(|e| StoreError::Realtime(format!("heartbeat failed: {}", e)))?;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Extract an inserted message row from a realtime frame, if it is one.
///
/// Join replies, heartbeat acks, and events for other tables come over the
/// same socket and are ignored.
fn parse_inserted_message(text: &str) -> Option<Message> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    if envelope.event != "INSERT" || envelope.topic != TOPIC {
        return None;
    }
    let record = envelope.payload.get("record")?.clone();
    match serde_json::from_value::<MessageRow>(record) {
        Ok(row) => Some(Message::from(row)),
        Err(e) => {
            tracing::warn!("undecodable realtime INSERT record: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inserted_message() {
        let frame = r#"{
            "topic": "realtime:public:messages",
            "event": "INSERT",
            "payload": {
                "schema": "public",
                "table": "messages",
                "record": {
                    "id": "m9",
                    "conversation_id": "c1",
                    "sender_id": "u2",
                    "content": "ping",
                    "timestamp": "2024-05-01T12:00:00Z",
                    "type": "text",
                    "status": "sent"
                }
            },
            "ref": null
        }"#;
        let msg = parse_inserted_message(frame).unwrap();
        assert_eq!(msg.id, "m9");
        assert_eq!(msg.conversation_id, "c1");
    }

    #[test]
    fn test_parse_ignores_other_events() {
        let reply = r#"{"topic":"realtime:public:messages","event":"phx_reply","payload":{"status":"ok"},"ref":"1"}"#;
        assert!(parse_inserted_message(reply).is_none());

        let other_topic = r#"{"topic":"realtime:public:users","event":"INSERT","payload":{"record":{}},"ref":null}"#;
        assert!(parse_inserted_message(other_topic).is_none());
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        assert!(parse_inserted_message("2::").is_none());
        assert!(parse_inserted_message("{}").is_none());
    }
}
