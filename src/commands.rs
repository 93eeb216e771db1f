//! CLI command implementations
//!
//! Thin presentation shell over the engine: every command loads config,
//! builds the store adapter and the engine, and prints projections. The
//! `watch` command is the live session loop.

use anyhow::{bail, Context, Result};
use chrono::Local;
use futures::future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, Instant};

use crate::config::Config;
use crate::engine::call::{format_duration, CallSession, CallType, MockCapture, StartOutcome};
use crate::engine::typing::TypingTracker;
use crate::engine::ChatEngine;
use crate::models::{initials_avatar, ConversationKind, Message, MessageStatus, MessageType, User};
use crate::store::rest::RestStore;
use crate::store::rows::NewUserRow;
use crate::store::RemoteStore;

fn open_store(config: &Config) -> Result<RestStore> {
    let (url, key) = config.store_credentials()?;
    Ok(RestStore::new(url, key))
}

async fn open_engine() -> Result<ChatEngine<RestStore>> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let user_id = config.require_user_id()?.to_string();
    let mut engine = ChatEngine::new(store, user_id);
    engine.load().await?;
    Ok(engine)
}

fn apply_store_flags(config: &mut Config, store_url: Option<String>, anon_key: Option<String>) {
    if let Some(url) = store_url {
        config.store_url = Some(url);
    }
    if let Some(key) = anon_key {
        config.anon_key = Some(key);
    }
}

/// Create an account and sign in.
pub async fn signup(
    name: &str,
    phone: &str,
    store_url: Option<String>,
    anon_key: Option<String>,
) -> Result<()> {
    let name = name.trim();
    let phone = phone.trim();
    if name.is_empty() {
        bail!("Name cannot be empty.");
    }
    if phone.is_empty() {
        bail!("Phone number cannot be empty.");
    }

    let mut config = Config::load()?;
    apply_store_flags(&mut config, store_url, anon_key);
    let store = open_store(&config)?;

    if store.find_user_by_phone(phone).await?.is_some() {
        bail!("This phone number is already registered. Use 'courier login'.");
    }

    let user = store
        .insert_user(&NewUserRow {
            name: name.to_string(),
            avatar: initials_avatar(name),
            phone_number: phone.to_string(),
        })
        .await?;

    config.user_id = Some(user.id.clone());
    config.save()?;
    println!("Account created. Signed in as {} ({}).", user.name, user.id);
    Ok(())
}

/// Sign in with a registered phone number.
pub async fn login(
    phone: &str,
    store_url: Option<String>,
    anon_key: Option<String>,
) -> Result<()> {
    let mut config = Config::load()?;
    apply_store_flags(&mut config, store_url, anon_key);
    let store = open_store(&config)?;

    let user = store
        .find_user_by_phone(phone.trim())
        .await?
        .context("No account found for that phone number. Run 'courier signup' first.")?;

    config.user_id = Some(user.id.clone());
    config.save()?;
    println!("Signed in as {} ({}).", user.name, user.id);
    Ok(())
}

/// Clear the persisted session.
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_session();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Show the current session.
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    match config.user_id.as_deref() {
        None => println!("Not signed in."),
        Some(id) => {
            println!("Signed in as: {}", id);
            // Best-effort profile lookup; the id alone is still useful offline.
            if let Ok(store) = open_store(&config) {
                if let Ok(users) = store.list_users().await {
                    if let Some(user) = users.iter().find(|u| u.id == id) {
                        println!("Name:         {}", user.name);
                        println!("Phone:        {}", user.phone_number);
                    }
                }
            }
        }
    }
    if let Some(url) = config.store_url.as_deref() {
        println!("Store:        {}", url);
    }
    Ok(())
}

/// List the user directory.
pub async fn list_users() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let users = store.list_users().await?;

    println!("\nUsers:");
    println!("{:-<60}", "");
    if users.is_empty() {
        println!("  (no users found)");
        return Ok(());
    }
    for user in &users {
        println!("{}  ({})", user.name, user.phone_number);
        println!("  ID: {}", user.id);
        if !user.avatar.is_empty() {
            println!("  Avatar: {}", user.avatar);
        }
    }
    Ok(())
}

fn content_label(msg: &Message) -> String {
    match msg.kind {
        MessageType::Text => msg.content.clone(),
        MessageType::Image => "[image]".to_string(),
        MessageType::Video => "[video]".to_string(),
        MessageType::Voice => "[voice message]".to_string(),
    }
}

fn sender_name<'a>(users: &'a [User], id: &'a str) -> &'a str {
    users
        .iter()
        .find(|u| u.id == id)
        .map(|u| u.name.as_str())
        .unwrap_or(id)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// List conversations in engine order (most recently active first).
pub async fn list_chats(limit: usize) -> Result<()> {
    let engine = open_engine().await?;

    println!("\nConversations:");
    println!("{:-<60}", "");
    if engine.conversations().is_empty() {
        println!("  (no conversations yet -- try 'courier new')");
        return Ok(());
    }

    for convo in engine.conversations().iter().take(limit) {
        let marker = if engine.active_conversation_id() == Some(convo.id.as_str()) {
            "*"
        } else {
            " "
        };
        let tag = match convo.kind {
            ConversationKind::Group => "  [group]",
            ConversationKind::Private => "",
        };
        println!(
            "{} {}{}",
            marker,
            convo.display_name(engine.current_user_id(), engine.users()),
            tag
        );
        println!("  ID: {}", convo.id);
        if let Some(ref avatar) = convo.avatar {
            println!("  Avatar: {}", avatar);
        }
        if let Some(last) = convo.last_message() {
            println!(
                "  Last: {}  {}: {}",
                last.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                sender_name(engine.users(), &last.sender_id),
                truncate(&content_label(last), 60)
            );
        }
    }
    Ok(())
}

/// Print a conversation's message history.
pub async fn read_messages(conversation_id: &str, limit: usize) -> Result<()> {
    let engine = open_engine().await?;
    let convo = engine
        .conversation(conversation_id)
        .context("No such conversation. Use 'courier chats' to list ids.")?;

    println!(
        "\n{}",
        convo.display_name(engine.current_user_id(), engine.users())
    );
    println!("{:-<60}", "");
    if convo.messages.is_empty() {
        println!("  (no messages)");
        return Ok(());
    }

    let start = convo.messages.len().saturating_sub(limit);
    for msg in &convo.messages[start..] {
        // Delivery ticks on the current user's own messages.
        let ticks = if msg.sender_id == engine.current_user_id() {
            match msg.status {
                MessageStatus::Sent => "  [sent]",
                MessageStatus::Delivered => "  [delivered]",
                MessageStatus::Read => "  [read]",
            }
        } else {
            ""
        };
        println!(
            "[{}] {}: {}{}",
            msg.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            sender_name(engine.users(), &msg.sender_id),
            content_label(msg),
            ticks
        );
    }
    Ok(())
}

/// One-shot send to a conversation.
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    let mut engine = open_engine().await?;
    if !engine.set_active_conversation(to) {
        bail!("No such conversation: {}. Use 'courier chats' to list ids.", to);
    }
    engine.send_message(message, MessageType::Text).await?;
    println!("Message sent.");
    Ok(())
}

/// Create (or select) a conversation with the given peers.
pub async fn new_conversation(with: &[String], name: Option<&str>) -> Result<()> {
    let mut engine = open_engine().await?;

    // Accept phone numbers as well as ids.
    let mut ids = Vec::new();
    for peer in with {
        let resolved = engine
            .users()
            .iter()
            .find(|u| u.id == *peer || u.phone_number == *peer)
            .with_context(|| format!("No such user: {}", peer))?;
        ids.push(resolved.id.clone());
    }

    let id = engine.create_conversation(&ids, name).await?;
    println!("Conversation ready: {}", id);
    Ok(())
}

/// Sleep until an optional deadline; never wakes when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => time::sleep_until(d).await,
        None => future::pending::<()>().await,
    }
}

fn print_watch_overview(engine: &ChatEngine<RestStore>) {
    println!("\nConversations (most recent first):");
    for (i, convo) in engine.conversations().iter().enumerate() {
        let marker = if engine.active_conversation_id() == Some(convo.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:>2}. {}",
            marker,
            i + 1,
            convo.display_name(engine.current_user_id(), engine.users())
        );
    }
    println!("\nType a message and press Enter to send to the active conversation.");
    println!("Commands: /chat N (switch), /chats (list), /quit. Ctrl-C to stop.\n");
}

/// Live session: bulk load, realtime subscription, interactive send loop.
pub async fn watch() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let user_id = config.require_user_id()?.to_string();

    // Subscribe before the load; early events for loaded conversations are
    // deduped by id, events for unknown ones are dropped.
    let mut feed = store.subscribe_inserted_messages().await?;

    let mut engine = ChatEngine::new(store, user_id);
    engine.load().await?;
    let mut typing = TypingTracker::new();

    if let Some(me) = engine.current_user() {
        println!("Signed in as {} ({}).", me.name, me.id);
    }
    print_watch_overview(&engine);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let typing_deadline = typing.next_deadline();
        tokio::select! {
            msg = feed.recv() => {
                match msg {
                    Some(msg) => {
                        if engine.conversation(&msg.conversation_id).is_some() {
                            println!(
                                "[{}] {}: {}",
                                msg.timestamp.with_timezone(&Local).format("%H:%M"),
                                sender_name(engine.users(), &msg.sender_id),
                                content_label(&msg)
                            );
                        }
                        engine.apply_inserted_message(msg);
                    }
                    None => {
                        println!("Push channel closed.");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !handle_watch_line(&mut engine, &mut typing, line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = sleep_until_opt(typing_deadline) => {
                let now = Instant::now();
                let me = engine.current_user_id().to_string();
                for conversation_id in typing.expire(now) {
                    engine.clear_typing(&conversation_id, &me);
                    tracing::debug!("typing expired in {}", conversation_id);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    // Teardown: release the subscription and cancel typing countdowns.
    feed.unsubscribe();
    typing.clear();
    Ok(())
}

/// Handle one line of watch input. Returns false to exit the loop.
async fn handle_watch_line(
    engine: &mut ChatEngine<RestStore>,
    typing: &mut TypingTracker,
    line: &str,
) -> bool {
    if line.is_empty() {
        return true;
    }

    if line == "/quit" {
        return false;
    }

    if line == "/chats" {
        print_watch_overview(engine);
        return true;
    }

    if let Some(arg) = line.strip_prefix("/chat ") {
        let selected = arg
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| engine.conversations().get(i))
            .map(|c| c.id.clone());
        match selected {
            Some(id) => {
                engine.set_active_conversation(&id);
                let name = engine
                    .active_conversation()
                    .map(|c| c.display_name(engine.current_user_id(), engine.users()))
                    .unwrap_or_default();
                println!("Active conversation: {}", name);
            }
            None => println!("Usage: /chat N (see /chats)"),
        }
        return true;
    }

    // Composing counts as typing activity in the active conversation.
    if let Some(active_id) = engine.active_conversation_id().map(str::to_string) {
        let me = engine.current_user_id().to_string();
        typing.note_input(&active_id, Instant::now());
        engine.note_typing(&active_id, &me);
    }

    // Send failures are transient notices; the session stays up. The sent
    // message only appears once its push event comes back.
    if let Err(e) = engine.send_message(line, MessageType::Text).await {
        println!("Failed to send message: {}", e);
    }
    true
}

/// Drive a locally mocked call against the call state machine.
pub async fn call(to: &str, video: bool, duration: u64) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    config.require_user_id()?;

    let users = store.list_users().await?;
    let contact = users
        .into_iter()
        .find(|u| u.id == to || u.phone_number == to)
        .with_context(|| format!("No such user: {}", to))?;

    let kind = if video { CallType::Video } else { CallType::Voice };
    let mut capture = MockCapture;
    let mut session = CallSession::new();
    match session.start(contact, kind, &mut capture)? {
        StartOutcome::Ready => {}
        StartOutcome::Degraded(e) => println!("Continuing without local video: {}", e),
    }
    if let Some(active) = session.current() {
        println!(
            "{} call with {} (Ctrl-C to hang up)",
            match active.kind {
                CallType::Video => "Video",
                CallType::Voice => "Voice",
            },
            active.contact.name
        );
    }

    let mut ticker = time::interval(Duration::from_secs(1));
    ticker.tick().await; // skip the immediate first tick
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                session.tick();
                let elapsed = session.current().map(|c| c.duration_secs).unwrap_or(0);
                if elapsed % 5 == 0 {
                    println!("  {} elapsed", format_duration(elapsed));
                }
                if elapsed >= duration {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    let final_duration = session.current().map(|c| c.duration_secs).unwrap_or(0);
    if session.is_active() {
        session.end(&mut capture);
    }
    println!("Call ended after {}.", format_duration(final_duration));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 60), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_content_label_hides_media_payloads() {
        let mut msg = Message {
            id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            content: "data:image/png;base64,AAAA".to_string(),
            timestamp: Utc::now(),
            kind: MessageType::Image,
            status: MessageStatus::Sent,
        };
        assert_eq!(content_label(&msg), "[image]");

        msg.kind = MessageType::Text;
        msg.content = "hello".to_string();
        assert_eq!(content_label(&msg), "hello");
    }

    #[test]
    fn test_sender_name_falls_back_to_id() {
        let users = vec![User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            avatar: String::new(),
            phone_number: "1".to_string(),
        }];
        assert_eq!(sender_name(&users, "u1"), "Ada");
        assert_eq!(sender_name(&users, "u9"), "u9");
    }
}
