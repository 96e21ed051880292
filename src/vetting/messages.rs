//! Everything the bot says.

use crate::chat::ChatUser;

pub const SETCHANNEL_USAGE: &str = "/setchannel <channel_url> <passphrase>";
pub const APPROVE_USAGE: &str = "/approve @<username>";

#[must_use]
pub fn greeting() -> String {
    "Woof! Woof! ▽・ω・▽".to_string()
}

#[must_use]
pub fn setup_instructions() -> String {
    format!("Admins, please promote me to admin and configure me by running {SETCHANNEL_USAGE}!")
}

/// Sent to a newcomer on join, and privately whenever they post before answering.
///
/// `/approve` finds pending users by username, so admins are told to reply
/// to users who have none.
#[must_use]
pub fn vet_prompt(user: &ChatUser, channel_url: &str) -> String {
    let mention = user.mention();
    let approve_hint = match &user.username {
        Some(_) => format!("typing /approve {mention}"),
        None => "replying to one of their messages with /approve".to_string(),
    };

    format!(
        "Hello, {mention}! Welcome to the group. Please read {channel_url} \
         and reply with the passphrase written in the channel. \
         To prevent spam, you will be prevented from sending messages until you do so. \
         Admins, you can manually approve this user by {approve_hint}."
    )
}

#[must_use]
pub fn vetted(mention: &str) -> String {
    format!("Woof!! Thanks, {mention}! You are free to chat as you wish. ▽ - ω - ▽")
}

#[must_use]
pub fn approved(mention: &str) -> String {
    format!("OK!! {mention} was manually approved! ▽・ω・▽")
}

#[must_use]
pub fn channel_updated() -> String {
    "You got it, dood! Channel updated! ▽・ω・▽".to_string()
}

#[must_use]
pub fn expired(mention: &str) -> String {
    format!("{mention} did not answer the passphrase in time and was removed. Grrr! ▽・ω・▽")
}
