mod common;

use common::{harness, harness_with, Scripted};
use persona_chat::config::WriteMode;
use persona_chat::error::ChatError;
use persona_chat::history::{DocumentStore, CHAT_HISTORY_FIELD};
use persona_chat::models::chat::{Persona, PromptMessage, Role, TranscriptEntry};
use persona_chat::session::TurnState;
use serde_json::json;
use std::time::Duration;

fn bff() -> Persona {
    Persona::custom("BFF", "A warm and friendly AI that loves to chat.")
}

#[tokio::test]
async fn first_login_greets_before_any_user_entry() {
    let h = harness(vec![]);
    let mut session = h.controller.new_session(bff());

    h.controller.login(&mut session, "Ada").await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].role, Role::Assistant);
    assert!(snapshot[0].message.starts_with("Hello Ada"));
    assert!(snapshot[0].message.ends_with("How can I assist you today?"));
    assert!(h.client.requests().is_empty());
}

#[tokio::test]
async fn greeting_fires_once_per_session() {
    let h = harness(vec![]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    assert!(h.controller.activate(&mut session).await.unwrap().is_none());
    h.controller.resume(&mut session).await.unwrap();
    assert_eq!(session.snapshot().len(), 1);
}

#[tokio::test]
async fn identity_with_history_is_not_greeted() {
    let h = harness(vec![]);
    let mut session = h.controller.new_session(bff());
    let identity = session.ensure_identity().clone();
    h.controller
        .transcripts()
        .append_and_persist(&identity, TranscriptEntry::user("earlier"), &[]).await
        .unwrap();

    h.controller.login(&mut session, "Ada").await.unwrap();

    assert_eq!(session.snapshot(), &[TranscriptEntry::user("earlier")]);
}

#[tokio::test]
async fn successful_turn_appends_user_then_assistant() {
    let h = harness(vec![Scripted::Reply("hello!")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    let outcome = h.controller.submit(&mut session, "hi").await.unwrap();

    assert!(outcome.persist_errors.is_empty());
    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(&snapshot[1..], &[TranscriptEntry::user("hi"), TranscriptEntry::assistant("hello!")]);
    assert_eq!(session.turn_state(), TurnState::AwaitingInput);

    let key = h.controller.transcripts().key_for(session.ensure_identity());
    let doc = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(doc[CHAT_HISTORY_FIELD], serde_json::to_value(session.snapshot()).unwrap());
}

#[tokio::test]
async fn request_carries_persona_and_no_prior_turns() {
    let h = harness(vec![Scripted::Reply("one"), Scripted::Reply("two")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    h.controller.submit(&mut session, "first").await.unwrap();
    h.controller.submit(&mut session, "second").await.unwrap();

    let requests = h.client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1],
        vec![
            PromptMessage::system("You are BFF, A warm and friendly AI that loves to chat."),
            PromptMessage::user("second")
        ]
    );
}

#[tokio::test]
async fn turns_never_interleave() {
    let h = harness(vec![Scripted::Reply("r1"), Scripted::Reply("r2"), Scripted::Reply("r3")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    for text in ["a", "b", "c"] {
        h.controller.submit(&mut session, text).await.unwrap();
    }

    let roles: Vec<Role> = session.snapshot()[1..].iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn empty_message_is_rejected_without_state_change() {
    let h = harness(vec![]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    let err = h.controller.submit(&mut session, "   ").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert_eq!(session.snapshot().len(), 1);
    assert!(h.client.requests().is_empty());
}

#[tokio::test]
async fn submit_before_login_is_rejected() {
    let h = harness(vec![Scripted::Reply("x")]);
    let mut session = h.controller.new_session(bff());

    let err = h.controller.submit(&mut session, "hi").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[tokio::test]
async fn empty_display_name_keeps_session_pre_login() {
    let h = harness(vec![]);
    let mut session = h.controller.new_session(bff());

    let err = h.controller.login(&mut session, "").await.unwrap_err();

    assert!(matches!(err, ChatError::Validation(_)));
    assert!(!session.is_logged_in());
    assert!(!session.is_hydrated());
    assert!(session.snapshot().is_empty());
}

#[tokio::test]
async fn submit_after_failed_load_asks_for_history() {
    let h = harness(vec![Scripted::Reply("hello!")]);
    let mut session = h.controller.new_session(bff());

    h.store.set_reads_failing(true);
    let err = h.controller.login(&mut session, "Ada").await.unwrap_err();
    assert!(matches!(err, ChatError::StoreUnavailable(_)));
    assert!(session.is_logged_in());
    assert!(!session.is_hydrated());

    let err = h.controller.submit(&mut session, "hi").await.unwrap_err();
    assert!(matches!(&err, ChatError::Validation(msg) if msg.contains("history")));
    assert!(h.client.requests().is_empty());

    h.store.set_reads_failing(false);
    h.controller.resume(&mut session).await.unwrap();
    assert_eq!(session.snapshot().len(), 1);
    h.controller.submit(&mut session, "hi").await.unwrap();
    assert_eq!(session.snapshot().len(), 3);
}

#[tokio::test]
async fn model_failure_leaves_unpaired_user_entry() {
    let h = harness(vec![Scripted::Fail("401 Unauthorized")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    let err = h.controller.submit(&mut session, "hi").await.unwrap_err();

    assert!(matches!(err, ChatError::ExternalService(msg) if msg.contains("401")));
    assert_eq!(session.snapshot().last(), Some(&TranscriptEntry::user("hi")));
    assert_eq!(session.turn_state(), TurnState::AwaitingInput);
}

#[tokio::test]
async fn slow_model_times_out() {
    let h = harness_with(vec![Scripted::Hang], WriteMode::LastWriterWins, Duration::from_millis(50));
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();

    let err = h.controller.submit(&mut session, "hi").await.unwrap_err();

    assert!(matches!(err, ChatError::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(session.turn_state(), TurnState::AwaitingInput);
}

#[tokio::test]
async fn store_outage_does_not_abort_the_turn() {
    let h = harness(vec![Scripted::Reply("hello!")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();
    let key = h.controller.transcripts().key_for(session.ensure_identity());

    h.store.set_failing(true);
    let outcome = h.controller.submit(&mut session, "hi").await.unwrap();

    assert_eq!(outcome.persist_errors.len(), 2);
    assert!(outcome.persist_errors.iter().all(|e| matches!(e, ChatError::StoreUnavailable(_))));
    assert_eq!(session.snapshot().len(), 3);

    // The store still only has the greeting.
    let doc = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(doc[CHAT_HISTORY_FIELD].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn next_successful_write_catches_the_store_up() {
    let h = harness(vec![Scripted::Reply("r1"), Scripted::Reply("r2")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();
    let key = h.controller.transcripts().key_for(session.ensure_identity());

    h.store.set_failing(true);
    h.controller.submit(&mut session, "a").await.unwrap();
    h.store.set_failing(false);
    h.controller.submit(&mut session, "b").await.unwrap();

    let doc = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(doc[CHAT_HISTORY_FIELD], serde_json::to_value(session.snapshot()).unwrap());
}

#[tokio::test]
async fn compare_and_swap_flags_a_concurrent_tab() {
    let h = harness_with(
        vec![Scripted::Reply("r1"), Scripted::Reply("r2")],
        WriteMode::CompareAndSwap,
        Duration::from_secs(5)
    );
    let mut tab_a = h.controller.new_session(bff());
    h.controller.login(&mut tab_a, "Ada").await.unwrap();
    let identity = tab_a.ensure_identity().clone();

    // Another writer appends behind tab A's back.
    let stored = h.controller.transcripts().load(&identity).await.unwrap();
    h.controller
        .transcripts()
        .append_and_persist(&identity, TranscriptEntry::user("from tab b"), &stored).await
        .unwrap();

    let outcome = h.controller.submit(&mut tab_a, "from tab a").await.unwrap();

    assert_eq!(outcome.persist_errors.len(), 2);
    assert!(matches!(outcome.persist_errors[0], ChatError::WriteConflict { expected: 1, found: 2 }));
    assert!(matches!(outcome.persist_errors[1], ChatError::WriteConflict { expected: 1, found: 2 }));
    assert_eq!(tab_a.snapshot().len(), 3);
    let persisted = h.controller.transcripts().load(&identity).await.unwrap();
    assert_eq!(persisted.last(), Some(&TranscriptEntry::user("from tab b")));
    assert!(tab_a.is_stale());
}

#[tokio::test]
async fn clear_resets_cache_and_document() {
    let h = harness(vec![Scripted::Reply("hello!")]);
    let mut session = h.controller.new_session(bff());
    h.controller.login(&mut session, "Ada").await.unwrap();
    h.controller.submit(&mut session, "hi").await.unwrap();

    session.clear().await.unwrap();

    assert!(session.snapshot().is_empty());
    let key = h.controller.transcripts().key_for(session.ensure_identity());
    assert_eq!(h.store.get(&key).await.unwrap().unwrap()[CHAT_HISTORY_FIELD], json!([]));
}
