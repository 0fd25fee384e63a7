use log::{ error, info, warn };
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{ ChatError, ChatResult };
use crate::history::TranscriptStore;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::models::chat::{ Persona, PromptMessage, TranscriptEntry };
use crate::session::{ Session, TurnState };

/// Result of one completed user turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub user: TranscriptEntry,
    pub reply: TranscriptEntry,
    /// Store writes that failed during the turn. The entries are still in
    /// the session.
    pub persist_errors: Vec<ChatError>,
}

/// Drives the request/response loop of a session: login, the first-visit
/// greeting, and user turns.
#[derive(Clone)]
pub struct TurnController {
    chat_client: Arc<dyn ChatClient>,
    transcripts: TranscriptStore,
    timeout: Duration,
}

pub fn greeting_for(display_name: &str, persona: &Persona) -> String {
    format!("Hello {}! I'm {}. How can I assist you today?", display_name, persona.name)
}

/// The outgoing request: persona framing plus the user's text. Earlier turns
/// are not included.
pub fn build_request(persona: &Persona, user_text: &str) -> Vec<PromptMessage> {
    vec![PromptMessage::system(persona.system_instruction()), PromptMessage::user(user_text)]
}

impl TurnController {
    pub fn new(chat_client: Arc<dyn ChatClient>, transcripts: TranscriptStore, timeout: Duration) -> Self {
        Self {
            chat_client,
            transcripts,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> ChatResult<Self> {
        let chat_client = new_chat_client(&config.chat)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            config.chat.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );
        let transcripts = TranscriptStore::from_config(config)?;
        Ok(Self::new(chat_client, transcripts, config.chat_timeout))
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    pub fn new_session(&self, persona: Persona) -> Session {
        Session::new(self.transcripts.clone(), persona)
    }

    /// Sets the display name, hydrates the transcript and greets first-time
    /// identities.
    pub async fn login(&self, session: &mut Session, name: &str) -> ChatResult<()> {
        session.set_display_name(name)?;
        self.resume(session).await
    }

    /// Hydrates a logged-in session that has not been hydrated yet (for
    /// instance after a failed load) or whose writes were rejected as stale,
    /// then fires the greeting if due. Reloading a stale session replaces its
    /// unsaved entries with the stored transcript.
    pub async fn resume(&self, session: &mut Session) -> ChatResult<()> {
        if !session.is_logged_in() {
            return Err(ChatError::Validation("Please enter your name first".to_string()));
        }
        if session.is_stale() {
            warn!("Reloading stale transcript for {}", session.ensure_identity());
        }
        if !session.is_hydrated() || session.is_stale() {
            session.hydrate().await?;
        }
        self.activate(session).await.map(|_| ())
    }

    /// Fires once per session after hydration. If the transcript is empty the
    /// persona greets the user by name before any user input.
    pub async fn activate(&self, session: &mut Session) -> ChatResult<Option<TranscriptEntry>> {
        if session.activated {
            return Ok(None);
        }
        session.activated = true;
        if !session.snapshot().is_empty() {
            return Ok(None);
        }

        let greeting = TranscriptEntry::assistant(greeting_for(session.display_name(), session.persona()));
        info!("Greeting first-time identity as {}", session.persona().name);
        session.append(greeting.clone()).await?;
        Ok(Some(greeting))
    }

    /// Runs one turn: user entry, model call, assistant entry.
    ///
    /// A model failure or timeout aborts the turn and leaves the user entry
    /// without a reply. Store failures do not abort; they are collected on
    /// the outcome.
    pub async fn submit(&self, session: &mut Session, text: &str) -> ChatResult<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("Message cannot be empty".to_string()));
        }
        if !session.is_logged_in() {
            return Err(ChatError::Validation("Please enter your name first".to_string()));
        }
        if !session.is_hydrated() {
            return Err(
                ChatError::Validation("Chat history is not loaded yet; request the history to retry".to_string())
            );
        }

        session.turn_state = TurnState::Processing;
        let result = self.run_turn(session, text).await;
        session.turn_state = TurnState::AwaitingInput;
        result
    }

    async fn run_turn(&self, session: &mut Session, text: &str) -> ChatResult<TurnOutcome> {
        let mut persist_errors = Vec::new();

        let user = TranscriptEntry::user(text);
        if let Err(e) = session.append(user.clone()).await {
            persist_errors.push(e);
        }

        let request = build_request(session.persona(), text);
        let reply = match tokio::time::timeout(self.timeout, self.chat_client.chat(&request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                error!("Response generation failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                warn!("Response generation exceeded {:?}", self.timeout);
                return Err(ChatError::Timeout(self.timeout));
            }
        };

        let reply = TranscriptEntry::assistant(reply);
        if let Err(e) = session.append(reply.clone()).await {
            persist_errors.push(e);
        }

        Ok(TurnOutcome { user, reply, persist_errors })
    }
}
