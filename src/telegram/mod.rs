//! Telegram adapter: a [`ChatClient`] over the Bot API and the update
//! dispatcher that feeds the vetting machine.

mod dispatch;

pub use dispatch::{BotIdentity, run};

use crate::chat::{Chat, ChatClient, ChatId, ChatKind, ChatUser, MessageId, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use teloxide::{
    Bot,
    payloads::{SendMessageSetters, UnbanChatMemberSetters},
    requests::Requester,
    types::{self as tg, ReplyParameters},
};

#[derive(Clone, Debug)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    #[must_use]
    pub fn new(token: &SecretString) -> Self {
        Self {
            bot: Bot::new(token.expose_secret()),
        }
    }

    #[must_use]
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    /// Who the bot is, needed to tell its own join apart from other members
    /// and to recognize `/command@botname`.
    ///
    /// # Errors
    /// Returns an error if the token is rejected or the API is unreachable.
    pub async fn identity(&self) -> Result<BotIdentity> {
        let me = self.bot.get_me().await.context("getMe failed")?;
        Ok(BotIdentity {
            id: user_id(me.user.id)?,
            username: me.user.username.clone(),
        })
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(tg_chat(chat), text).await?;
        Ok(())
    }

    async fn reply(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        self.bot
            .send_message(tg_chat(chat), text)
            .reply_parameters(ReplyParameters::new(tg::MessageId(message.0)))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.bot
            .delete_message(tg_chat(chat), tg::MessageId(message.0))
            .await?;
        Ok(())
    }

    async fn chat_admins(&self, chat: ChatId) -> Result<Vec<UserId>> {
        self.bot
            .get_chat_administrators(tg_chat(chat))
            .await?
            .into_iter()
            .map(|member| user_id(member.user.id))
            .collect()
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.bot
            .ban_chat_member(tg_chat(chat), tg_user(user)?)
            .await?;
        Ok(())
    }

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.bot
            .unban_chat_member(tg_chat(chat), tg_user(user)?)
            .only_if_banned(true)
            .await?;
        Ok(())
    }

    async fn resolve_member(&self, chat: ChatId, user: UserId) -> Result<ChatUser> {
        let member = self
            .bot
            .get_chat_member(tg_chat(chat), tg_user(user)?)
            .await?;
        chat_user(&member.user)
    }
}

fn tg_chat(chat: ChatId) -> tg::ChatId {
    tg::ChatId(chat.0)
}

fn tg_user(user: UserId) -> Result<tg::UserId> {
    let id = u64::try_from(user.0).with_context(|| format!("invalid user id {user}"))?;
    Ok(tg::UserId(id))
}

fn user_id(id: tg::UserId) -> Result<UserId> {
    let id = i64::try_from(id.0).with_context(|| format!("user id {} out of range", id.0))?;
    Ok(UserId(id))
}

pub(crate) fn chat_user(user: &tg::User) -> Result<ChatUser> {
    Ok(ChatUser {
        id: user_id(user.id)?,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        is_bot: user.is_bot,
    })
}

pub(crate) fn chat(chat: &tg::Chat) -> Chat {
    let kind = if chat.is_group() || chat.is_supergroup() {
        ChatKind::Group
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Private
    };

    Chat {
        id: ChatId(chat.id.0),
        kind,
        title: chat.title().map(ToString::to_string),
    }
}
