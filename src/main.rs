//! Courier CLI - Lightweight messaging client
//!
//! A terminal client for a Supabase-style messaging backend.

mod commands;
mod config;
mod engine;
mod models;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Lightweight CLI messaging client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Phone number
        #[arg(short, long)]
        phone: String,

        /// Store project URL (persisted)
        #[arg(long)]
        store_url: Option<String>,

        /// Store anonymous API key (persisted)
        #[arg(long)]
        anon_key: Option<String>,
    },

    /// Sign in with a registered phone number
    Login {
        /// Phone number
        #[arg(short, long)]
        phone: String,

        /// Store project URL (persisted)
        #[arg(long)]
        store_url: Option<String>,

        /// Store anonymous API key (persisted)
        #[arg(long)]
        anon_key: Option<String>,
    },

    /// Sign out and clear the persisted session
    Logout,

    /// Show current session status
    Status,

    /// List all users
    Users,

    /// List conversations, most recently active first
    Chats {
        /// Maximum number of conversations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Read messages from a conversation
    Read {
        /// Conversation ID (from `chats` output)
        conversation_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Conversation ID (from `chats` output)
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Create a conversation (or select the existing private one)
    New {
        /// Peer user ids or phone numbers, comma separated
        #[arg(short, long, value_delimiter = ',')]
        with: Vec<String>,

        /// Group name (makes the conversation a named group)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Live session: stream incoming messages and send interactively
    Watch,

    /// Place a locally mocked voice/video call
    Call {
        /// Contact user id or phone number
        #[arg(short, long)]
        to: String,

        /// Start as a video call
        #[arg(long)]
        video: bool,

        /// Hang up after this many seconds
        #[arg(short, long, default_value = "15")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Signup {
            name,
            phone,
            store_url,
            anon_key,
        } => {
            commands::signup(&name, &phone, store_url, anon_key).await?;
        }
        Commands::Login {
            phone,
            store_url,
            anon_key,
        } => {
            commands::login(&phone, store_url, anon_key).await?;
        }
        Commands::Logout => {
            commands::logout().await?;
        }
        Commands::Status => {
            commands::status().await?;
        }
        Commands::Users => {
            commands::list_users().await?;
        }
        Commands::Chats { limit } => {
            tracing::info!("Fetching conversations...");
            commands::list_chats(limit).await?;
        }
        Commands::Read {
            conversation_id,
            limit,
        } => {
            commands::read_messages(&conversation_id, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            commands::send_message(&to, &message).await?;
        }
        Commands::New { with, name } => {
            commands::new_conversation(&with, name.as_deref()).await?;
        }
        Commands::Watch => {
            commands::watch().await?;
        }
        Commands::Call {
            to,
            video,
            duration,
        } => {
            commands::call(&to, video, duration).await?;
        }
    }

    Ok(())
}
