use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use log::debug;
use super::{ ChatClient, CompletionResponse };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::PromptMessage;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        if config.llm_type != LlmType::Ollama {
            return Err(ChatError::Configuration("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, ChatError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: self.completion_model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
        };
        debug!("Sending {} messages to Ollama model {}", req.messages.len(), self.completion_model);
        let resp = self.http.post(&url).json(&req).send().await?.error_for_status()?;
        let data = resp.json::<ChatResponse>().await?;
        Ok(CompletionResponse { content: data.message.content })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
