pub mod groq;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::groq::GroqChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::error::ChatError;
use crate::models::chat::PromptMessage;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
}

/// The response-generation collaborator: one blocking request per turn.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Pulls the first choice's text out of an OpenAI-style completion body.
pub(crate) fn first_choice<T>(choices: Vec<T>, provider: &str, text: impl Fn(T) -> String) -> Result<CompletionResponse, ChatError> {
    choices
        .into_iter()
        .next()
        .map(|c| CompletionResponse { content: text(c) })
        .ok_or_else(|| ChatError::ExternalService(format!("No response from {} API", provider)))
}
