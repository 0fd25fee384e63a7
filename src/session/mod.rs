pub mod cache;
pub mod identity;

use log::info;

use crate::error::{ ChatError, ChatResult };
use crate::history::TranscriptStore;
use crate::models::chat::{ Persona, TranscriptEntry };
use self::cache::SessionCache;
use self::identity::{ validate_display_name, Identity };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    Processing,
}

/// Everything one interactive session owns. Created per connection and
/// passed explicitly to every operation; never shared between sessions.
pub struct Session {
    identity: Option<Identity>,
    display_name: String,
    persona: Persona,
    pub(crate) cache: SessionCache,
    pub(crate) turn_state: TurnState,
    pub(crate) activated: bool,
}

impl Session {
    pub fn new(store: TranscriptStore, persona: Persona) -> Self {
        Self {
            identity: None,
            display_name: String::new(),
            persona,
            cache: SessionCache::new(store),
            turn_state: TurnState::AwaitingInput,
            activated: false,
        }
    }

    /// Returns the session's identity, generating it on first use.
    pub fn ensure_identity(&mut self) -> &Identity {
        self.identity.get_or_insert_with(|| {
            let id = Identity::generate();
            info!("Assigned identity {}", id);
            id
        })
    }

    /// Sets the display name once. An empty (after trimming) name leaves the
    /// session logged out.
    pub fn set_display_name(&mut self, name: &str) -> ChatResult<()> {
        if self.is_logged_in() {
            return Err(ChatError::Validation("Display name is already set".to_string()));
        }
        let name = validate_display_name(name)?;
        let identity = self.ensure_identity().clone();
        info!("Session {} logged in as '{}'", identity, name);
        self.display_name = name;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        !self.display_name.is_empty()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn is_hydrated(&self) -> bool {
        self.cache.is_hydrated()
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    pub fn snapshot(&self) -> &[TranscriptEntry] {
        self.cache.snapshot()
    }

    /// Loads the persisted transcript for this session's identity.
    pub async fn hydrate(&mut self) -> ChatResult<&[TranscriptEntry]> {
        let identity = self.ensure_identity().clone();
        self.cache.hydrate(&identity).await
    }

    pub async fn append(&mut self, entry: TranscriptEntry) -> ChatResult<&[TranscriptEntry]> {
        self.cache.append(entry).await
    }

    pub async fn clear(&mut self) -> ChatResult<()> {
        self.cache.clear().await
    }
}
