#![allow(dead_code)]

use async_trait::async_trait;
use persona_chat::agent::TurnController;
use persona_chat::config::WriteMode;
use persona_chat::error::{ChatError, ChatResult};
use persona_chat::history::{Document, DocumentStore, MemoryDocumentStore, SwapOutcome, TranscriptStore};
use persona_chat::llm::chat::{ChatClient, CompletionResponse};
use persona_chat::models::chat::PromptMessage;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Scripted {
    Reply(&'static str),
    Fail(&'static str),
    Hang,
}

/// Chat client that answers from a script and records every request.
#[derive(Default)]
pub struct ScriptedChatClient {
    script: Mutex<VecDeque<Scripted>>,
    pub requests: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedChatClient {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Vec<PromptMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, ChatError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(CompletionResponse { content: text.to_string() }),
            Some(Scripted::Fail(reason)) => Err(ChatError::ExternalService(reason.to_string())),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ChatError::ExternalService("woke up".into()))
            }
            None => Err(ChatError::ExternalService("script exhausted".into())),
        }
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// Wraps the memory store and fails writes while `failing` is set, reads
/// while `reads_failing` is set.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryDocumentStore,
    pub failing: AtomicBool,
    pub reads_failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> ChatResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &str) -> ChatResult<Option<Document>> {
        if self.reads_failing.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable("read timed out".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, document: Document, merge: bool) -> ChatResult<()> {
        self.check()?;
        self.inner.set(key, document, merge).await
    }

    async fn set_array_if_len(
        &self,
        key: &str,
        field: &str,
        expected_len: usize,
        value: Vec<Value>,
    ) -> ChatResult<SwapOutcome> {
        self.check()?;
        self.inner.set_array_if_len(key, field, expected_len, value).await
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub client: Arc<ScriptedChatClient>,
    pub controller: TurnController,
}

pub fn harness(script: Vec<Scripted>) -> Harness {
    harness_with(script, WriteMode::LastWriterWins, Duration::from_secs(5))
}

pub fn harness_with(script: Vec<Scripted>, mode: WriteMode, timeout: Duration) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let client = ScriptedChatClient::new(script);
    let transcripts = TranscriptStore::new(store.clone(), "chat:", mode);
    let controller = TurnController::new(client.clone(), transcripts, timeout);
    Harness { store, client, controller }
}
