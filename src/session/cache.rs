use log::{ debug, error };

use crate::error::{ ChatError, ChatResult };
use crate::history::TranscriptStore;
use crate::models::chat::{ Transcript, TranscriptEntry };
use crate::session::identity::Identity;

/// In-memory mirror of one identity's transcript for the lifetime of a
/// session. This is what gets rendered; the store only receives copies.
pub struct SessionCache {
    store: TranscriptStore,
    identity: Option<Identity>,
    transcript: Transcript,
    // Entries known to be in the store as of the last successful read or write.
    persisted_len: usize,
    // Set when a compare-and-swap write found a newer transcript in the store.
    stale: bool,
}

impl SessionCache {
    pub fn new(store: TranscriptStore) -> Self {
        Self {
            store,
            identity: None,
            transcript: Vec::new(),
            persisted_len: 0,
            stale: false,
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.identity.is_some()
    }

    /// True once a write was rejected because another session moved the
    /// stored transcript ahead. Every later write conflicts until the next
    /// [`hydrate`](Self::hydrate).
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replaces the working transcript with the persisted one.
    pub async fn hydrate(&mut self, identity: &Identity) -> ChatResult<&[TranscriptEntry]> {
        let loaded = self.store.load(identity).await?;
        debug!("Hydrated {} entries for {}", loaded.len(), identity);
        self.persisted_len = loaded.len();
        self.stale = false;
        self.transcript = loaded;
        self.identity = Some(identity.clone());
        Ok(&self.transcript)
    }

    pub fn snapshot(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Appends locally, then persists. The local entry is kept even when the
    /// write fails, so the session and the store may diverge.
    pub async fn append(&mut self, entry: TranscriptEntry) -> ChatResult<&[TranscriptEntry]> {
        let identity = self.identity
            .clone()
            .ok_or_else(|| ChatError::Validation("Session is not logged in".to_string()))?;

        let previous_len = self.transcript.len();
        self.transcript.push(entry.clone());
        let written = self.store.append_and_persist_from(
            &identity,
            entry,
            &self.transcript[..previous_len],
            self.persisted_len
        ).await;
        match written {
            Ok(_) => {
                self.persisted_len = self.transcript.len();
                Ok(&self.transcript)
            }
            Err(e) => {
                error!("Failed to persist entry {} for {}: {}", previous_len, identity, e);
                if matches!(e, ChatError::WriteConflict { .. }) {
                    self.stale = true;
                }
                Err(e)
            }
        }
    }

    /// Drops every entry, locally and in the store.
    pub async fn clear(&mut self) -> ChatResult<()> {
        let identity = self.identity
            .clone()
            .ok_or_else(|| ChatError::Validation("Session is not logged in".to_string()))?;

        self.transcript.clear();
        if let Err(e) = self.store.clear(&identity, self.persisted_len).await {
            if matches!(e, ChatError::WriteConflict { .. }) {
                self.stale = true;
            }
            return Err(e);
        }
        self.persisted_len = 0;
        Ok(())
    }
}
