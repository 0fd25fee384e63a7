mod memory;
mod redis;

pub use self::memory::MemoryDocumentStore;
pub use self::redis::RedisDocumentStore;

use async_trait::async_trait;
use log::{ info, warn };
use serde_json::Value;
use std::sync::Arc;

use crate::config::{ AppConfig, StoreType, WriteMode };
use crate::error::{ ChatError, ChatResult };
use crate::models::chat::{ Transcript, TranscriptEntry };
use crate::session::identity::Identity;

/// Field of the per-identity document holding the transcript array.
pub const CHAT_HISTORY_FIELD: &str = "chat_history";

pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Written,
    Stale {
        found: usize,
    },
}

/// Keyed document storage with merge writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> ChatResult<Option<Document>>;

    /// With `merge`, fields absent from `document` keep their stored values.
    /// Without it the stored document is replaced wholesale.
    async fn set(&self, key: &str, document: Document, merge: bool) -> ChatResult<()>;

    /// Replaces the array in `field` only if it currently holds `expected_len`
    /// elements. A missing field counts as empty.
    async fn set_array_if_len(
        &self,
        key: &str,
        field: &str,
        expected_len: usize,
        value: Vec<Value>
    ) -> ChatResult<SwapOutcome>;
}

pub fn create_document_store(config: &AppConfig) -> ChatResult<Arc<dyn DocumentStore>> {
    match config.store_type {
        StoreType::Redis => {
            let creds = config.store_credentials
                .as_ref()
                .ok_or_else(||
                    ChatError::Configuration("Redis store requires STORE_CREDENTIALS".into())
                )?;
            let store = RedisDocumentStore::new(creds)?;
            Ok(Arc::new(store))
        }
        StoreType::Memory => {
            warn!("Using the in-memory document store; transcripts will not survive a restart.");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}

/// Durable per-identity transcripts on top of a [`DocumentStore`].
///
/// Every write sends the whole `chat_history` array. Under
/// [`WriteMode::LastWriterWins`] a second session sharing the identity has
/// its entries silently overwritten; [`WriteMode::CompareAndSwap`] reports
/// that case as [`ChatError::WriteConflict`] instead.
#[derive(Clone)]
pub struct TranscriptStore {
    documents: Arc<dyn DocumentStore>,
    key_prefix: String,
    write_mode: WriteMode,
}

impl TranscriptStore {
    pub fn new(documents: Arc<dyn DocumentStore>, key_prefix: impl Into<String>, write_mode: WriteMode) -> Self {
        Self {
            documents,
            key_prefix: key_prefix.into(),
            write_mode,
        }
    }

    pub fn from_config(config: &AppConfig) -> ChatResult<Self> {
        info!(
            "Transcripts will be stored in: {} (prefix '{}', {})",
            config.store_type,
            config.key_prefix,
            config.write_mode
        );
        let documents = create_document_store(config)?;
        Ok(Self::new(documents, config.key_prefix.clone(), config.write_mode))
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn key_for(&self, identity: &Identity) -> String {
        format!("{}{}", self.key_prefix, identity)
    }

    /// A missing document is an empty transcript, not an error.
    pub async fn load(&self, identity: &Identity) -> ChatResult<Transcript> {
        let key = self.key_for(identity);
        let Some(document) = self.documents.get(&key).await? else {
            return Ok(Vec::new());
        };
        decode_history(&key, &document)
    }

    /// Writes `current + [entry]` back to the identity's document and
    /// returns the new sequence.
    pub async fn append_and_persist(
        &self,
        identity: &Identity,
        entry: TranscriptEntry,
        current: &[TranscriptEntry]
    ) -> ChatResult<Transcript> {
        self.append_and_persist_from(identity, entry, current, current.len()).await
    }

    /// Same as [`append_and_persist`](Self::append_and_persist), but a
    /// compare-and-swap write is checked against `persisted_len`, the length
    /// the caller last read from or wrote to the store, which trails
    /// `current.len()` after a failed write.
    pub async fn append_and_persist_from(
        &self,
        identity: &Identity,
        entry: TranscriptEntry,
        current: &[TranscriptEntry],
        persisted_len: usize
    ) -> ChatResult<Transcript> {
        let mut updated = current.to_vec();
        updated.push(entry);
        self.write(identity, &updated, persisted_len).await?;
        Ok(updated)
    }

    pub async fn clear(&self, identity: &Identity, current_len: usize) -> ChatResult<()> {
        self.write(identity, &[], current_len).await
    }

    async fn write(
        &self,
        identity: &Identity,
        transcript: &[TranscriptEntry],
        expected_len: usize
    ) -> ChatResult<()> {
        let key = self.key_for(identity);
        let values = transcript
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChatError::StoreUnavailable(format!("Failed to encode transcript: {}", e)))?;

        match self.write_mode {
            WriteMode::LastWriterWins => {
                let mut partial = Document::new();
                partial.insert(CHAT_HISTORY_FIELD.to_string(), Value::Array(values));
                self.documents.set(&key, partial, true).await
            }
            WriteMode::CompareAndSwap => {
                match
                    self.documents.set_array_if_len(
                        &key,
                        CHAT_HISTORY_FIELD,
                        expected_len,
                        values
                    ).await?
                {
                    SwapOutcome::Written => Ok(()),
                    SwapOutcome::Stale { found } => {
                        warn!(
                            "Stale transcript write for {}: expected {} entries, store has {}",
                            key,
                            expected_len,
                            found
                        );
                        Err(ChatError::WriteConflict { expected: expected_len, found })
                    }
                }
            }
        }
    }
}

fn decode_history(key: &str, document: &Document) -> ChatResult<Transcript> {
    match document.get(CHAT_HISTORY_FIELD) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) =>
            serde_json
                ::from_value::<Transcript>(value.clone())
                .map_err(|e|
                    ChatError::StoreUnavailable(format!("Corrupt transcript document '{}': {}", key, e))
                ),
    }
}

/// Length of the array stored under `field`, treating a missing field as empty.
pub(crate) fn array_len(document: Option<&Document>, field: &str) -> usize {
    document
        .and_then(|d| d.get(field))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
