#![allow(clippy::unwrap_used)]

use super::*;
use crate::chat::fake::{Call, RecordingClient};
use crate::chat::{ChatKind, MessageId};
use crate::store::StoreOptions;
use std::{sync::Arc, time::Duration};

const GROUP: ChatId = ChatId(-100_123);
const ADMIN: UserId = UserId(1);
const REX: UserId = UserId(42);

struct Harness {
    machine: VettingMachine,
    client: Arc<RecordingClient>,
}

async fn harness(client: RecordingClient) -> Harness {
    let store = Store::connect(StoreOptions::new("sqlite::memory:"))
        .await
        .unwrap();
    let client = Arc::new(client.with_admins(GROUP, &[ADMIN]));
    let machine = VettingMachine::new(
        store,
        BoundedClient::new(client.clone(), Duration::from_secs(1)),
    );
    Harness { machine, client }
}

async fn configured_harness(client: RecordingClient) -> Harness {
    let h = harness(client).await;
    assert!(
        h.machine
            .store()
            .set_auth_channel(GROUP, "news", "woof")
            .await
    );
    h
}

fn group() -> Chat {
    Chat {
        id: GROUP,
        kind: ChatKind::Group,
        title: Some("Dog Park".to_string()),
    }
}

fn private_with(user: UserId) -> Chat {
    Chat {
        id: ChatId::from(user),
        kind: ChatKind::Private,
        title: None,
    }
}

fn user(id: UserId, username: &str) -> ChatUser {
    ChatUser {
        id,
        username: Some(username.to_string()),
        first_name: username.to_uppercase(),
        is_bot: false,
    }
}

fn rex() -> ChatUser {
    user(REX, "rex")
}

fn admin() -> ChatUser {
    user(ADMIN, "alpha")
}

fn message(chat: Chat, sender: ChatUser, id: i32, text: Option<&str>) -> InboundMessage {
    InboundMessage {
        chat,
        id: MessageId(id),
        sender,
        text: text.map(ToString::to_string),
        reply_to: None,
    }
}

#[tokio::test]
async fn bot_added_greets_and_asks_for_setup() {
    let h = harness(RecordingClient::new()).await;

    h.machine.on_bot_added(&group()).await;

    assert_eq!(
        h.client.sent_texts(),
        vec![
            (GROUP, messages::greeting()),
            (GROUP, messages::setup_instructions()),
        ]
    );
}

#[tokio::test]
async fn join_without_auth_channel_only_instructs() {
    let h = harness(RecordingClient::new()).await;

    let state = h.machine.on_member_joined(&group(), &rex()).await;

    assert_eq!(state, VettingState::Unchallenged);
    assert!(h.machine.store().is_vetted(GROUP, REX).await);
    assert_eq!(
        h.client.calls(),
        vec![Call::Sent {
            chat: GROUP,
            text: messages::setup_instructions(),
        }]
    );
}

#[tokio::test]
async fn join_issues_challenge_with_channel_link() {
    let h = configured_harness(RecordingClient::new()).await;

    let state = h.machine.on_member_joined(&group(), &rex()).await;

    assert_eq!(state, VettingState::Pending);
    assert!(!h.machine.store().is_vetted(GROUP, REX).await);
    assert_eq!(
        h.client.sent_texts(),
        vec![(GROUP, messages::vet_prompt(&rex(), "https://t.me/news"))]
    );
}

#[tokio::test]
async fn bots_joining_are_not_challenged() {
    let h = configured_harness(RecordingClient::new()).await;
    let mut bot = user(UserId(77), "other_bot");
    bot.is_bot = true;

    let state = h.machine.on_member_joined(&group(), &bot).await;

    assert_eq!(state, VettingState::Unchallenged);
    assert!(h.machine.store().is_vetted(GROUP, bot.id).await);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn configure_join_and_answer() {
    let h = harness(RecordingClient::new()).await;

    let setup = message(group(), admin(), 1, Some("/setchannel news woof"));
    assert_eq!(
        h.machine.on_set_channel_command(&setup, "news woof").await,
        Ok(())
    );

    assert_eq!(
        h.machine.on_member_joined(&group(), &rex()).await,
        VettingState::Pending
    );

    let answer = message(group(), rex(), 10, Some("woof"));
    assert_eq!(h.machine.on_message(&answer).await, MessageOutcome::Vetted);

    assert!(h.machine.store().is_vetted(GROUP, REX).await);

    let calls = h.client.calls();
    assert!(calls.contains(&Call::Replied {
        chat: GROUP,
        message: MessageId(1),
        text: messages::channel_updated(),
    }));
    assert!(calls.contains(&Call::Sent {
        chat: GROUP,
        text: messages::vetted("@rex"),
    }));
    assert_eq!(
        calls.last(),
        Some(&Call::Deleted {
            chat: GROUP,
            message: MessageId(10),
        })
    );
}

#[tokio::test]
async fn wrong_answer_is_deleted_and_prompt_resent_privately() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let guess = message(group(), rex(), 11, Some("meow"));
    assert_eq!(h.machine.on_message(&guess).await, MessageOutcome::TurnedAway);

    assert!(!h.machine.store().is_vetted(GROUP, REX).await);

    let calls = h.client.calls();
    assert_eq!(
        &calls[1..],
        &[
            Call::Deleted {
                chat: GROUP,
                message: MessageId(11),
            },
            Call::Sent {
                chat: ChatId::from(REX),
                text: messages::vet_prompt(&rex(), "https://t.me/news"),
            },
        ]
    );
}

#[tokio::test]
async fn non_text_content_from_pending_user_is_turned_away() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let sticker = message(group(), rex(), 12, None);
    assert_eq!(
        h.machine.on_message(&sticker).await,
        MessageOutcome::TurnedAway
    );
    assert!(!h.machine.store().is_vetted(GROUP, REX).await);
}

#[tokio::test]
async fn commands_are_never_read_as_answers() {
    let h = harness(RecordingClient::new()).await;
    assert!(
        h.machine
            .store()
            .set_auth_channel(GROUP, "news", "/woof")
            .await
    );
    h.machine.on_member_joined(&group(), &rex()).await;

    let command = message(group(), rex(), 13, Some("/woof"));
    assert_eq!(
        h.machine.on_message(&command).await,
        MessageOutcome::TurnedAway
    );
    assert!(!h.machine.store().is_vetted(GROUP, REX).await);
}

#[tokio::test]
async fn vetted_users_and_private_chats_pass_through() {
    let h = configured_harness(RecordingClient::new()).await;

    let chatter = message(group(), admin(), 20, Some("hello dogs"));
    assert_eq!(
        h.machine.on_message(&chatter).await,
        MessageOutcome::PassedThrough
    );

    h.machine.on_member_joined(&group(), &rex()).await;
    let before = h.client.calls().len();

    let dm = message(private_with(REX), rex(), 21, Some("meow"));
    assert_eq!(h.machine.on_message(&dm).await, MessageOutcome::PassedThrough);

    assert_eq!(h.client.calls().len(), before);
    assert!(!h.machine.store().is_vetted(GROUP, REX).await);
}

#[tokio::test]
async fn failed_delete_still_resends_prompt() {
    let h = configured_harness(RecordingClient::new().failing("delete_message")).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let guess = message(group(), rex(), 14, Some("meow"));
    assert_eq!(h.machine.on_message(&guess).await, MessageOutcome::TurnedAway);

    assert_eq!(
        h.client.calls().last(),
        Some(&Call::Sent {
            chat: ChatId::from(REX),
            text: messages::vet_prompt(&rex(), "https://t.me/news"),
        })
    );
}

#[tokio::test]
async fn non_admin_commands_are_deleted_silently() {
    let h = configured_harness(RecordingClient::new()).await;

    let attempt = message(group(), rex(), 30, Some("/setchannel spam meow"));
    assert_eq!(
        h.machine.on_set_channel_command(&attempt, "spam meow").await,
        Err(Rejection::NotAdmin)
    );

    assert_eq!(
        h.client.calls(),
        vec![Call::Deleted {
            chat: GROUP,
            message: MessageId(30),
        }]
    );
    assert!(h.machine.store().check_passphrase(GROUP, "woof").await);
}

#[tokio::test]
async fn unavailable_admin_list_counts_as_not_admin() {
    let h = configured_harness(RecordingClient::new().failing("chat_admins")).await;

    let attempt = message(group(), admin(), 31, Some("/approve @rex"));
    assert_eq!(
        h.machine.on_approve_command(&attempt, "@rex").await,
        Err(Rejection::AdminCheckFailed)
    );
    assert_eq!(
        h.client.calls(),
        vec![Call::Deleted {
            chat: GROUP,
            message: MessageId(31),
        }]
    );
}

#[tokio::test]
async fn commands_outside_groups_are_answered() {
    let h = harness(RecordingClient::new()).await;

    let attempt = message(private_with(ADMIN), admin(), 32, Some("/setchannel news woof"));
    assert_eq!(
        h.machine.on_set_channel_command(&attempt, "news woof").await,
        Err(Rejection::NotInGroup)
    );

    assert_eq!(
        h.client.calls(),
        vec![Call::Replied {
            chat: ChatId::from(ADMIN),
            message: MessageId(32),
            text: Rejection::NotInGroup.user_message().unwrap(),
        }]
    );
}

#[tokio::test]
async fn set_channel_explains_missing_arguments() {
    let h = harness(RecordingClient::new()).await;

    let no_args = message(group(), admin(), 33, Some("/setchannel"));
    assert_eq!(
        h.machine.on_set_channel_command(&no_args, "").await,
        Err(Rejection::MissingChannel)
    );

    let no_passphrase = message(group(), admin(), 34, Some("/setchannel news"));
    assert_eq!(
        h.machine.on_set_channel_command(&no_passphrase, "news").await,
        Err(Rejection::MissingPassphrase)
    );

    assert_eq!(
        h.client.sent_texts(),
        vec![
            (GROUP, Rejection::MissingChannel.user_message().unwrap()),
            (GROUP, Rejection::MissingPassphrase.user_message().unwrap()),
        ]
    );
    assert_eq!(h.machine.store().get_auth_channel(GROUP).await, None);
}

#[tokio::test]
async fn approve_by_username() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let approve = message(group(), admin(), 40, Some("/approve @Rex"));
    assert_eq!(h.machine.on_approve_command(&approve, "@Rex").await, Ok(REX));

    assert!(h.machine.store().is_vetted(GROUP, REX).await);
    assert_eq!(
        h.client.calls().last(),
        Some(&Call::Replied {
            chat: GROUP,
            message: MessageId(40),
            text: messages::approved("@Rex"),
        })
    );
}

#[tokio::test]
async fn approve_by_reply() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let mut approve = message(group(), admin(), 41, Some("/approve"));
    approve.reply_to = Some(rex());

    assert_eq!(h.machine.on_approve_command(&approve, "").await, Ok(REX));
    assert!(h.machine.store().is_vetted(GROUP, REX).await);
}

#[tokio::test]
async fn approve_without_target_shows_usage() {
    let h = configured_harness(RecordingClient::new()).await;

    let approve = message(group(), admin(), 42, Some("/approve"));
    assert_eq!(
        h.machine.on_approve_command(&approve, "").await,
        Err(Rejection::MissingTarget)
    );
    assert_eq!(
        h.client.sent_texts(),
        vec![(GROUP, Rejection::MissingTarget.user_message().unwrap())]
    );
}

#[tokio::test]
async fn approve_unknown_user_is_reported() {
    let h = configured_harness(RecordingClient::new()).await;

    let approve = message(group(), admin(), 43, Some("/approve @fido"));
    assert_eq!(
        h.machine.on_approve_command(&approve, "@fido").await,
        Err(Rejection::NotPending("@fido".to_string()))
    );
}

#[tokio::test]
async fn on_command_routes_to_handlers() {
    let h = harness(RecordingClient::new()).await;

    let setup = message(group(), admin(), 50, Some("/setchannel news woof"));
    let command = Command::parse("/setchannel news woof", None).unwrap();
    h.machine.on_command(&setup, &command).await;

    assert!(h.machine.store().check_passphrase(GROUP, "woof").await);
}

#[tokio::test]
async fn approve_by_reply_requires_a_pending_challenge() {
    let h = configured_harness(RecordingClient::new()).await;

    let mut approve = message(group(), admin(), 44, Some("/approve"));
    approve.reply_to = Some(rex());

    assert_eq!(
        h.machine.on_approve_command(&approve, "").await,
        Err(Rejection::NotPending("@rex".to_string()))
    );
    assert_eq!(
        h.client.sent_texts(),
        vec![(
            GROUP,
            Rejection::NotPending("@rex".to_string())
                .user_message()
                .unwrap()
        )]
    );
}

#[tokio::test]
async fn users_without_username_are_approved_by_reply() {
    let h = configured_harness(RecordingClient::new()).await;
    let mut shy = user(UserId(43), "shy");
    shy.username = None;

    h.machine.on_member_joined(&group(), &shy).await;

    let prompt = messages::vet_prompt(&shy, "https://t.me/news");
    assert!(prompt.contains("replying to one of their messages with /approve"));
    assert_eq!(h.client.sent_texts(), vec![(GROUP, prompt)]);

    let mut approve = message(group(), admin(), 45, Some("/approve"));
    approve.reply_to = Some(shy.clone());
    assert_eq!(h.machine.on_approve_command(&approve, "").await, Ok(shy.id));
    assert!(h.machine.store().is_vetted(GROUP, shy.id).await);
}

#[tokio::test]
async fn pending_users_cannot_run_commands() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let text = "/setchannel spam meow";
    let attempt = message(group(), rex(), 60, Some(text));
    let command = Command::parse(text, None);

    assert_eq!(
        h.machine.on_inbound(&attempt, command.as_ref()).await,
        MessageOutcome::TurnedAway
    );

    assert!(h.machine.store().check_passphrase(GROUP, "woof").await);
    assert!(!h.machine.store().check_passphrase(GROUP, "meow").await);
    assert!(!h.machine.store().is_vetted(GROUP, REX).await);
    assert_eq!(
        &h.client.calls()[1..],
        &[
            Call::Deleted {
                chat: GROUP,
                message: MessageId(60),
            },
            Call::Sent {
                chat: ChatId::from(REX),
                text: messages::vet_prompt(&rex(), "https://t.me/news"),
            },
        ]
    );
}

#[tokio::test]
async fn vetted_admin_commands_run() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let text = "/approve @rex";
    let approve = message(group(), admin(), 61, Some(text));
    let command = Command::parse(text, None);

    assert_eq!(
        h.machine.on_inbound(&approve, command.as_ref()).await,
        MessageOutcome::CommandHandled
    );
    assert!(h.machine.store().is_vetted(GROUP, REX).await);
}

#[tokio::test]
async fn plain_messages_go_through_vetting() {
    let h = configured_harness(RecordingClient::new()).await;
    h.machine.on_member_joined(&group(), &rex()).await;

    let answer = message(group(), rex(), 62, Some("woof"));
    assert_eq!(
        h.machine.on_inbound(&answer, None).await,
        MessageOutcome::Vetted
    );
}

#[tokio::test]
async fn commands_in_private_chats_are_answered() {
    let h = harness(RecordingClient::new()).await;

    let text = "/setchannel news woof";
    let attempt = message(private_with(ADMIN), admin(), 63, Some(text));
    let command = Command::parse(text, None);

    assert_eq!(
        h.machine.on_inbound(&attempt, command.as_ref()).await,
        MessageOutcome::CommandHandled
    );
    assert_eq!(
        h.client.sent_texts(),
        vec![(
            ChatId::from(ADMIN),
            Rejection::NotInGroup.user_message().unwrap()
        )]
    );
}
