use super::{chat, chat_user};
use crate::chat::{InboundMessage, MessageId, UserId};
use crate::vetting::{Command, VettingMachine};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    Bot,
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    types::{Message, Update},
};
use tracing::{debug, info};

/// The bot's own account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: Option<String>,
}

/// Receive updates until Ctrl-C. Updates from one chat are handled in order;
/// different chats are handled concurrently.
pub async fn run(bot: Bot, machine: Arc<VettingMachine>, identity: BotIdentity) {
    info!(username = ?identity.username, "listening for updates");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![machine, identity])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(
    msg: Message,
    machine: Arc<VettingMachine>,
    identity: BotIdentity,
) -> Result<()> {
    let group = chat(&msg.chat);

    if let Some(members) = msg.new_chat_members() {
        for member in members {
            let member = chat_user(member)?;
            if member.id == identity.id {
                machine.on_bot_added(&group).await;
            } else {
                machine.on_member_joined(&group, &member).await;
            }
        }
        return Ok(());
    }

    if msg.left_chat_member().is_some() {
        return Ok(());
    }

    let Some(sender) = msg.from.as_ref() else {
        debug!(chat = %group.id, "message without sender, ignoring");
        return Ok(());
    };

    let reply_to = match msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
        Some(author) => Some(chat_user(author)?),
        None => None,
    };

    let inbound = InboundMessage {
        chat: group,
        id: MessageId(msg.id.0),
        sender: chat_user(sender)?,
        text: msg.text().map(ToString::to_string),
        reply_to,
    };

    let command = inbound
        .text
        .as_deref()
        .and_then(|text| Command::parse(text, identity.username.as_deref()));

    let outcome = machine.on_inbound(&inbound, command.as_ref()).await;
    debug!(chat = %inbound.chat.id, ?outcome, "message handled");

    Ok(())
}
