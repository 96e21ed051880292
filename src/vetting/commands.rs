//! Admin command parsing and validation.

use super::messages::{APPROVE_USAGE, SETCHANNEL_USAGE};
use crate::chat::{BoundedClient, InboundMessage};
use crate::store::channel_url;
use regex::Regex;
use std::fmt;
use tracing::warn;

pub const COMMAND_MARKER: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/setchannel <channel_url> <passphrase>`
    SetChannel(String),
    /// `/approve @username`, or bare `/approve` as a reply
    Approve(String),
}

impl Command {
    /// Recognize one of the bot's commands and split off its payload.
    ///
    /// `/command@name` is accepted only when `name` is this bot's username
    /// (or the username is unknown). Anything else is not a command for us.
    #[must_use]
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let rest = text.trim_start().strip_prefix(COMMAND_MARKER)?;
        let (head, payload) = match rest.split_once(char::is_whitespace) {
            Some((head, payload)) => (head, payload.trim()),
            None => (rest, ""),
        };

        let (name, addressee) = match head.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (head, None),
        };

        if let (Some(addressee), Some(me)) = (addressee, bot_username)
            && !addressee.eq_ignore_ascii_case(me)
        {
            return None;
        }

        match name.to_ascii_lowercase().as_str() {
            "setchannel" => Some(Self::SetChannel(payload.to_string())),
            "approve" => Some(Self::Approve(payload.to_string())),
            _ => None,
        }
    }
}

/// Why a command was refused, and what (if anything) to tell the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotInGroup,
    NotAdmin,
    AdminCheckFailed,
    MissingChannel,
    MissingPassphrase,
    TooManyArguments,
    MissingTarget,
    /// Carries the target's mention.
    NotPending(String),
    StorageUnavailable,
}

impl Rejection {
    /// Reply text for the sender. `None` means the sender gets no answer.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::NotInGroup => {
                Some("Please send this command from the group you wish to configure.".to_string())
            }
            Self::MissingChannel => Some(format!(
                "Please send a channel name along with your command! ({SETCHANNEL_USAGE})"
            )),
            Self::MissingPassphrase => Some(format!(
                "Please send a passphrase along with your command! ({SETCHANNEL_USAGE})"
            )),
            Self::TooManyArguments => Some(format!(
                "The passphrase must be a single word! ({SETCHANNEL_USAGE})"
            )),
            Self::MissingTarget => Some(format!(
                "Please send a username along with your command! ({APPROVE_USAGE})"
            )),
            Self::NotPending(mention) => {
                Some(format!("{mention} is not waiting for approval here."))
            }
            Self::NotAdmin | Self::AdminCheckFailed | Self::StorageUnavailable => None,
        }
    }

    /// Commands from non-admins are removed from the group instead of answered.
    #[must_use]
    pub fn deletes_command(&self) -> bool {
        matches!(self, Self::NotAdmin | Self::AdminCheckFailed)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInGroup => write!(f, "not sent from a group"),
            Self::NotAdmin => write!(f, "sender is not an admin"),
            Self::AdminCheckFailed => write!(f, "admin list unavailable"),
            Self::MissingChannel => write!(f, "missing channel"),
            Self::MissingPassphrase => write!(f, "missing passphrase"),
            Self::TooManyArguments => write!(f, "too many arguments"),
            Self::MissingTarget => write!(f, "missing target user"),
            Self::NotPending(mention) => write!(f, "{mention} has no pending challenge"),
            Self::StorageUnavailable => write!(f, "storage unavailable"),
        }
    }
}

/// The one admin gate shared by every admin command: the message must come
/// from a group and its sender must be one of the group's admins.
///
/// An admin list that cannot be fetched counts as "not an admin".
///
/// # Errors
/// Returns the [`Rejection`] describing which check failed.
pub async fn require_group_admin(
    client: &BoundedClient,
    message: &InboundMessage,
) -> Result<(), Rejection> {
    if !message.chat.is_group() {
        return Err(Rejection::NotInGroup);
    }

    match client.is_admin(message.chat.id, message.sender.id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Rejection::NotAdmin),
        Err(err) => {
            warn!(
                group = %message.chat.id,
                user = %message.sender.id,
                "could not fetch admins: {err:#}"
            );
            Err(Rejection::AdminCheckFailed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetChannelArgs {
    pub channel: String,
    pub passphrase: String,
}

/// Split a `/setchannel` payload into channel and passphrase.
///
/// # Errors
/// Returns the [`Rejection`] naming the missing or extra argument.
pub fn parse_set_channel_args(payload: &str) -> Result<SetChannelArgs, Rejection> {
    let args: Vec<&str> = payload.split_whitespace().collect();

    match args.as_slice() {
        [] => Err(Rejection::MissingChannel),
        [channel, ..] if channel_url::normalize(channel).is_none() => {
            Err(Rejection::MissingChannel)
        }
        [_] => Err(Rejection::MissingPassphrase),
        [channel, passphrase] => Ok(SetChannelArgs {
            channel: (*channel).to_string(),
            passphrase: (*passphrase).to_string(),
        }),
        _ => Err(Rejection::TooManyArguments),
    }
}

/// Extract the username from an `/approve` payload, without the `@`.
/// Returns `None` for an empty or malformed payload.
#[must_use]
pub fn parse_approve_args(payload: &str) -> Option<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }

    Regex::new(r"^@?([A-Za-z0-9_]{1,32})$")
        .ok()?
        .captures(payload)
        .and_then(|captures| captures.get(1))
        .map(|username| username.as_str().to_string())
}
