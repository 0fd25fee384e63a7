//! Runs against a live Redis only when `REDIS_URL` is set, e.g.
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_store`.

use persona_chat::config::{StoreCredentials, WriteMode};
use persona_chat::error::ChatError;
use persona_chat::history::{Document, DocumentStore, RedisDocumentStore, SwapOutcome, TranscriptStore};
use persona_chat::models::chat::TranscriptEntry;
use persona_chat::session::identity::Identity;
use serde_json::json;
use std::sync::Arc;

fn redis_store() -> Option<RedisDocumentStore> {
    let url = std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty())?;
    let creds = StoreCredentials { url, username: None, password: None, database: None };
    Some(RedisDocumentStore::new(&creds).unwrap())
}

fn scratch_key() -> String {
    format!("persona-chat-test:{}", Identity::generate())
}

fn doc(pairs: &[(&str, serde_json::Value)]) -> Document {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn merge_and_replace_writes() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set; skipping");
        return;
    };
    let key = scratch_key();

    store.set(&key, doc(&[("display_name", json!("Ada")), ("chat_history", json!([]))]), true).await.unwrap();
    store.set(&key, doc(&[("chat_history", json!([{ "role": "user", "message": "hi" }]))]), true).await.unwrap();
    let merged = store.get(&key).await.unwrap().unwrap();
    assert_eq!(merged["display_name"], json!("Ada"));
    assert_eq!(merged["chat_history"], json!([{ "role": "user", "message": "hi" }]));

    store.set(&key, doc(&[("chat_history", json!([]))]), false).await.unwrap();
    let replaced = store.get(&key).await.unwrap().unwrap();
    assert_eq!(replaced, doc(&[("chat_history", json!([]))]));

    // An empty replace deletes the hash outright.
    store.set(&key, Document::new(), false).await.unwrap();
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn swap_script_checks_stored_length() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set; skipping");
        return;
    };
    let key = scratch_key();

    let outcome = store.set_array_if_len(&key, "chat_history", 1, vec![json!("x")]).await.unwrap();
    assert_eq!(outcome, SwapOutcome::Stale { found: 0 });

    let outcome = store.set_array_if_len(&key, "chat_history", 0, vec![json!("x")]).await.unwrap();
    assert_eq!(outcome, SwapOutcome::Written);

    let outcome = store.set_array_if_len(&key, "chat_history", 0, vec![json!("y")]).await.unwrap();
    assert_eq!(outcome, SwapOutcome::Stale { found: 1 });
    assert_eq!(store.get(&key).await.unwrap().unwrap()["chat_history"], json!(["x"]));

    store.set(&key, Document::new(), false).await.unwrap();
}

#[tokio::test]
async fn transcripts_conflict_through_redis() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set; skipping");
        return;
    };
    let documents = Arc::new(store);
    let transcripts = TranscriptStore::new(documents.clone(), "persona-chat-test:", WriteMode::CompareAndSwap);
    let id = Identity::generate();

    let current = transcripts.append_and_persist(&id, TranscriptEntry::user("a"), &[]).await.unwrap();
    let err = transcripts.append_and_persist(&id, TranscriptEntry::user("b"), &[]).await.unwrap_err();
    assert!(matches!(err, ChatError::WriteConflict { expected: 0, found: 1 }));
    assert_eq!(transcripts.load(&id).await.unwrap(), current);

    documents.set(&transcripts.key_for(&id), Document::new(), false).await.unwrap();
}
