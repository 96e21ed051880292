use super::{ChatClient, ChatId, ChatUser, MessageId, UserId};
use anyhow::{Result, anyhow};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::debug;

/// Applies one timeout to every chat-client call.
///
/// An elapsed timeout is reported as an ordinary `Err`, so callers treat it
/// like any other transient client failure.
#[derive(Clone)]
pub struct BoundedClient {
    inner: Arc<dyn ChatClient>,
    timeout: Duration,
}

impl BoundedClient {
    #[must_use]
    pub fn new(inner: Arc<dyn ChatClient>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            Duration::from_secs(1)
        } else {
            timeout
        };
        Self { inner, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|err| err.context(format!("{operation} failed"))),
            Err(_) => {
                debug!(operation, "chat client call timed out");
                Err(anyhow!(
                    "{operation} timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            }
        }
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bounded("send_message", self.inner.send_message(chat, text))
            .await
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn reply(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        self.bounded("reply", self.inner.reply(chat, message, text))
            .await
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.bounded("delete_message", self.inner.delete_message(chat, message))
            .await
    }

    /// Whether `user` is one of `chat`'s administrators.
    ///
    /// # Errors
    /// Returns an error if the admin list cannot be fetched in time.
    pub async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let admins = self
            .bounded("chat_admins", self.inner.chat_admins(chat))
            .await?;
        Ok(admins.contains(&user))
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.bounded("ban_member", self.inner.ban_member(chat, user))
            .await
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.bounded("unban_member", self.inner.unban_member(chat, user))
            .await
    }

    /// # Errors
    /// Returns an error if the call fails or times out.
    pub async fn resolve_member(&self, chat: ChatId, user: UserId) -> Result<ChatUser> {
        self.bounded("resolve_member", self.inner.resolve_member(chat, user))
            .await
    }
}

impl std::fmt::Debug for BoundedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
