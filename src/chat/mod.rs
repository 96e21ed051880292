//! Platform-neutral chat model and the client seam used by the vetting core.
//!
//! The state machine and the sweeper never talk to Telegram directly. They
//! receive [`InboundMessage`]s and act through a [`ChatClient`], always wrapped
//! in a [`BoundedClient`] so no call can block an event handler indefinitely.

mod bounded;
#[cfg(test)]
pub(crate) mod fake;

pub use bounded::BoundedClient;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// A group, supergroup, channel or private chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Message id, unique within its chat only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A user's private chat shares the user's numeric id.
impl From<UserId> for ChatId {
    fn from(user: UserId) -> Self {
        Self(user.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub is_bot: bool,
}

impl ChatUser {
    /// `@username` when the user has one, otherwise their first name.
    #[must_use]
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

impl Chat {
    /// Groups and supergroups; the only chats where vetting applies.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == ChatKind::Group
    }
}

/// Any message a user posts: text, photo, sticker, voice and so on.
/// Non-text content carries `text: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat: Chat,
    pub id: MessageId,
    pub sender: ChatUser,
    pub text: Option<String>,
    /// Author of the message this one replies to, if any.
    pub reply_to: Option<ChatUser>,
}

impl InboundMessage {
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| text.starts_with(crate::vetting::commands::COMMAND_MARKER))
    }
}

/// Operations the bot needs from the chat platform.
///
/// Implementations report failures (missing permissions, unknown users,
/// network errors) as `Err`; callers log them and carry on.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Send `text` to `chat` as a reply to `message`.
    async fn reply(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()>;

    /// Ids of the chat's administrators, creator included.
    async fn chat_admins(&self, chat: ChatId) -> Result<Vec<UserId>>;

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()>;

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<()>;

    async fn resolve_member(&self, chat: ChatId, user: UserId) -> Result<ChatUser>;
}
