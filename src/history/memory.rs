use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ array_len, Document, DocumentStore, SwapOutcome };
use crate::error::ChatResult;

/// Process-local document store. Used for development and tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &str) -> ChatResult<Option<Document>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, document: Document, merge: bool) -> ChatResult<()> {
        let mut documents = self.documents.write().await;
        if merge {
            documents.entry(key.to_string()).or_default().extend(document);
        } else {
            documents.insert(key.to_string(), document);
        }
        Ok(())
    }

    async fn set_array_if_len(
        &self,
        key: &str,
        field: &str,
        expected_len: usize,
        value: Vec<Value>
    ) -> ChatResult<SwapOutcome> {
        let mut documents = self.documents.write().await;
        let found = array_len(documents.get(key), field);
        if found != expected_len {
            return Ok(SwapOutcome::Stale { found });
        }
        documents.entry(key.to_string()).or_default().insert(field.to_string(), Value::Array(value));
        Ok(SwapOutcome::Written)
    }
}
