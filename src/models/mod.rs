//! Data models for messaging entities

mod conversation;
mod message;
mod user;

pub use conversation::*;
pub use message::*;
pub use user::*;
