//! The vetting state machine.
//!
//! One entry point per event kind. Each handler re-reads whatever it needs
//! from the [`Store`] and never caches, so concurrent handlers only meet at
//! the store's transactions. Client failures are logged and skipped; they
//! never abort the handler.

pub mod commands;
pub mod messages;
mod state;

#[cfg(test)]
mod tests;

pub use self::commands::{Command, Rejection};
pub use self::state::VettingState;

use crate::chat::{BoundedClient, Chat, ChatId, ChatUser, InboundMessage, UserId};
use crate::store::Store;
use tracing::{debug, info, instrument, warn};

/// What became of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Private chat, or the sender is already vetted.
    PassedThrough,
    /// The message was the passphrase; the sender is vetted now.
    Vetted,
    /// Sender is still pending; message deleted and prompt resent.
    TurnedAway,
    /// The passphrase matched but the challenge could not be cleared.
    StorageFailed,
    /// A command from a user allowed to post; routed to its handler.
    CommandHandled,
}

#[derive(Clone, Debug)]
pub struct VettingMachine {
    store: Store,
    client: BoundedClient,
}

impl VettingMachine {
    #[must_use]
    pub fn new(store: Store, client: BoundedClient) -> Self {
        Self { store, client }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The bot itself was added to a group.
    #[instrument(skip_all, fields(group = %chat.id))]
    pub async fn on_bot_added(&self, chat: &Chat) {
        info!(title = ?chat.title, "added to group");

        self.send(chat.id, &messages::greeting()).await;
        self.send(chat.id, &messages::setup_instructions()).await;
    }

    /// A user joined a group. Challenges them if the group is configured.
    #[instrument(skip_all, fields(group = %chat.id, user = %user.id))]
    pub async fn on_member_joined(&self, chat: &Chat, user: &ChatUser) -> VettingState {
        if user.is_bot {
            debug!("bot account joined, not challenging");
            return VettingState::Unchallenged;
        }

        let Some(channel_url) = self.store.get_auth_channel(chat.id).await else {
            info!(username = ?user.username, "new member, but no auth channel is set here");
            self.send(chat.id, &messages::setup_instructions()).await;
            return VettingState::Unchallenged;
        };

        if !self.store.upsert_challenge(chat.id, user).await {
            return VettingState::Unchallenged;
        }

        info!(username = ?user.username, "new member, issuing challenge");

        self.send(
            chat.id,
            &messages::vet_prompt(user, &channel_url),
        )
        .await;

        VettingState::Pending
    }

    /// Entry point for every message with a sender. `command` is the message
    /// parsed as one of the bot's commands, if it is one.
    ///
    /// Pending users cannot run commands: theirs are treated like any other
    /// message from them and go through vetting.
    #[instrument(skip_all, fields(group = %message.chat.id, user = %message.sender.id))]
    pub async fn on_inbound(
        &self,
        message: &InboundMessage,
        command: Option<&Command>,
    ) -> MessageOutcome {
        let Some(command) = command else {
            return self.on_message(message).await;
        };

        let may_run = !message.chat.is_group()
            || self
                .store
                .vetting_state(message.chat.id, message.sender.id)
                .await
                .is_vetted();

        if may_run {
            self.on_command(message, command).await;
            MessageOutcome::CommandHandled
        } else {
            debug!("command from pending user");
            self.on_message(message).await
        }
    }

    /// Any message posted anywhere the bot can see: text, photos, stickers and
    /// so on. Only pending senders in groups are affected.
    #[instrument(skip_all, fields(group = %message.chat.id, user = %message.sender.id))]
    pub async fn on_message(&self, message: &InboundMessage) -> MessageOutcome {
        if !message.chat.is_group() {
            return MessageOutcome::PassedThrough;
        }

        let group = message.chat.id;
        let sender = message.sender.id;

        match self.store.vetting_state(group, sender).await {
            VettingState::Unchallenged => MessageOutcome::PassedThrough,
            VettingState::Pending => {
                // Commands are never read as an answer.
                let answer = message.text.as_deref().filter(|_| !message.is_command());

                let matched = match answer {
                    Some(text) => self.store.check_passphrase(group, text).await,
                    None => false,
                };

                if matched {
                    self.accept(message).await
                } else {
                    self.turn_away(message).await
                }
            }
        }
    }

    async fn accept(&self, message: &InboundMessage) -> MessageOutcome {
        let group = message.chat.id;

        if !self.store.remove_challenge(group, message.sender.id).await {
            return MessageOutcome::StorageFailed;
        }

        info!(username = ?message.sender.username, "user was vetted");

        self.send(group, &messages::vetted(&message.sender.mention()))
            .await;
        self.delete(message).await;

        MessageOutcome::Vetted
    }

    async fn turn_away(&self, message: &InboundMessage) -> MessageOutcome {
        let group = message.chat.id;

        self.delete(message).await;

        let channel_url = self
            .store
            .get_auth_channel(group)
            .await
            .unwrap_or_else(|| "the group's rules channel".to_string());

        self.send(
            ChatId::from(message.sender.id),
            &messages::vet_prompt(&message.sender, &channel_url),
        )
        .await;

        MessageOutcome::TurnedAway
    }

    /// `/approve @username` (or `/approve` in reply to the user's message).
    ///
    /// # Errors
    /// Returns the [`Rejection`] when the sender, the chat, or the target does
    /// not check out. The sender has already been answered (or the command
    /// deleted) when this returns.
    #[instrument(skip_all, fields(group = %message.chat.id, user = %message.sender.id))]
    pub async fn on_approve_command(
        &self,
        message: &InboundMessage,
        payload: &str,
    ) -> Result<UserId, Rejection> {
        info!("attempting manual approval");

        let result = self.approve(message, payload).await;
        if let Err(rejection) = &result {
            self.reject(message, rejection).await;
        }
        result
    }

    async fn approve(&self, message: &InboundMessage, payload: &str) -> Result<UserId, Rejection> {
        commands::require_group_admin(&self.client, message).await?;

        let (target, mention) = self.approve_target(message, payload).await?;

        match self.store.take_challenge(message.chat.id, target).await {
            Some(true) => {}
            Some(false) => return Err(Rejection::NotPending(mention)),
            None => return Err(Rejection::StorageUnavailable),
        }

        info!(target = %target, "manually approved");

        self.reply(message, &messages::approved(&mention)).await;

        Ok(target)
    }

    async fn approve_target(
        &self,
        message: &InboundMessage,
        payload: &str,
    ) -> Result<(UserId, String), Rejection> {
        if let Some(username) = commands::parse_approve_args(payload) {
            return match self
                .store
                .find_challenged_user(message.chat.id, &username)
                .await
            {
                Some(user) => Ok((user, format!("@{username}"))),
                None => Err(Rejection::NotPending(format!("@{username}"))),
            };
        }

        if payload.trim().is_empty()
            && let Some(user) = &message.reply_to
        {
            return Ok((user.id, user.mention()));
        }

        Err(Rejection::MissingTarget)
    }

    /// `/setchannel <channel_url> <passphrase>`.
    ///
    /// # Errors
    /// Returns the [`Rejection`] when the sender, the chat, or the arguments
    /// do not check out. The sender has already been answered (or the command
    /// deleted) when this returns.
    #[instrument(skip_all, fields(group = %message.chat.id, user = %message.sender.id))]
    pub async fn on_set_channel_command(
        &self,
        message: &InboundMessage,
        payload: &str,
    ) -> Result<(), Rejection> {
        info!("attempting to set auth channel");

        let result = self.set_channel(message, payload).await;
        if let Err(rejection) = &result {
            self.reject(message, rejection).await;
        }
        result
    }

    async fn set_channel(&self, message: &InboundMessage, payload: &str) -> Result<(), Rejection> {
        commands::require_group_admin(&self.client, message).await?;

        let args = commands::parse_set_channel_args(payload)?;

        if !self
            .store
            .set_auth_channel(message.chat.id, &args.channel, &args.passphrase)
            .await
        {
            return Err(Rejection::StorageUnavailable);
        }

        info!(channel = %args.channel, "auth channel updated");

        self.reply(message, &messages::channel_updated()).await;

        Ok(())
    }

    /// Route a parsed command to its handler.
    pub async fn on_command(&self, message: &InboundMessage, command: &Command) {
        // Rejections are answered inside the handlers.
        let result = match command {
            Command::SetChannel(payload) => self.on_set_channel_command(message, payload).await,
            Command::Approve(payload) => self
                .on_approve_command(message, payload)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => debug!("command done"),
            Err(rejection) => debug!(reason = %rejection, "command refused"),
        }
    }

    async fn reject(&self, message: &InboundMessage, rejection: &Rejection) {
        info!(reason = %rejection, "command rejected");

        if let Some(text) = rejection.user_message() {
            self.reply(message, &text).await;
        } else if rejection.deletes_command() {
            self.delete(message).await;
        }
    }

    async fn send(&self, chat: ChatId, text: &str) {
        if let Err(err) = self.client.send_message(chat, text).await {
            warn!(%chat, "could not send message: {err:#}");
        }
    }

    async fn reply(&self, message: &InboundMessage, text: &str) {
        if let Err(err) = self.client.reply(message.chat.id, message.id, text).await {
            warn!(chat = %message.chat.id, "could not reply: {err:#}");
        }
    }

    async fn delete(&self, message: &InboundMessage) {
        if let Err(err) = self.client.delete_message(message.chat.id, message.id).await {
            warn!(
                chat = %message.chat.id,
                message = %message.id,
                "could not delete message, do we have admin permission there? {err:#}"
            );
        }
    }
}
