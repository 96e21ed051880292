//! # Bigboofer (Passphrase Gatekeeper)
//!
//! `bigboofer` keeps spam accounts out of Telegram groups. Every user who joins
//! a configured group is challenged to repeat a passphrase published in a
//! companion channel. Until they do, anything they post is deleted and the
//! instructions are resent privately.
//!
//! ## Vetting
//!
//! A (group, user) pair is either `Unchallenged` or `Pending`. The state is not
//! stored as a column: a row in the `challenge` table means `Pending`, no row
//! means `Unchallenged`. Joining creates (or refreshes) the row; answering with
//! the passphrase, a manual `/approve`, or expiry deletes it.
//!
//! ## Expiry
//!
//! A background sweeper removes users whose challenge is older than the
//! configured TTL (5 minutes by default) and clears their row whether or not
//! the removal succeeded.
//!
//! ## Failure Policy
//!
//! Storage and chat-client failures never abort event handling. They are
//! logged, and reads fall back to documented defaults: the vetted check fails
//! open unless configured otherwise, the passphrase check always fails closed.

pub mod chat;
pub mod cli;
pub mod store;
pub mod sweeper;
pub mod telegram;
pub mod vetting;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
