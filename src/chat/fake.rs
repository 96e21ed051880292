//! Recording `ChatClient` used by unit tests.

use super::{ChatClient, ChatId, ChatUser, MessageId, UserId};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Sent {
        chat: ChatId,
        text: String,
    },
    Replied {
        chat: ChatId,
        message: MessageId,
        text: String,
    },
    Deleted {
        chat: ChatId,
        message: MessageId,
    },
    Banned {
        chat: ChatId,
        user: UserId,
    },
    Unbanned {
        chat: ChatId,
        user: UserId,
    },
}

#[derive(Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    admins: HashMap<ChatId, Vec<UserId>>,
    members: HashMap<UserId, ChatUser>,
    failing: HashSet<&'static str>,
    failing_bans: HashSet<UserId>,
    delay: Option<Duration>,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_admins(mut self, chat: ChatId, admins: &[UserId]) -> Self {
        self.admins.insert(chat, admins.to_vec());
        self
    }

    pub(crate) fn with_member(mut self, user: ChatUser) -> Self {
        self.members.insert(user.id, user);
        self
    }

    /// Make every call to `operation` fail (e.g. `"delete_message"`).
    pub(crate) fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub(crate) fn failing_ban_for(mut self, user: UserId) -> Self {
        self.failing_bans.insert(user);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub(crate) fn sent_texts(&self) -> Vec<(ChatId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Sent { chat, text } | Call::Replied { chat, text, .. } => Some((chat, text)),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, operation: &'static str) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(operation) {
            return Err(anyhow!("{operation}: forbidden"));
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.enter("send_message").await?;
        self.record(Call::Sent {
            chat,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn reply(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        self.enter("reply").await?;
        self.record(Call::Replied {
            chat,
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.enter("delete_message").await?;
        self.record(Call::Deleted { chat, message });
        Ok(())
    }

    async fn chat_admins(&self, chat: ChatId) -> Result<Vec<UserId>> {
        self.enter("chat_admins").await?;
        Ok(self.admins.get(&chat).cloned().unwrap_or_default())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.enter("ban_member").await?;
        if self.failing_bans.contains(&user) {
            return Err(anyhow!("ban_member: not enough rights"));
        }
        self.record(Call::Banned { chat, user });
        Ok(())
    }

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.enter("unban_member").await?;
        self.record(Call::Unbanned { chat, user });
        Ok(())
    }

    async fn resolve_member(&self, _chat: ChatId, user: UserId) -> Result<ChatUser> {
        self.enter("resolve_member").await?;
        self.members
            .get(&user)
            .cloned()
            .ok_or_else(|| anyhow!("resolve_member: user {user} not found"))
    }
}
